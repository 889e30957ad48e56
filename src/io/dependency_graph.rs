// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parent/child graph of a tree description, keyed by node id

use super::description::TreeDescription;
use ahash::AHashMap;
use std::collections::HashSet;

/// Unique identifier of a described node
pub type NodeId = String;

/// Dependency graph tracking parent-child relationships
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Maps node ID to its direct children
    children: AHashMap<NodeId, Vec<NodeId>>,
    /// Maps node ID to its direct parents
    parents: AHashMap<NodeId, Vec<NodeId>>,
    /// Node IDs in declaration order
    nodes: Vec<NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph from every node's child list
    pub fn from_description(description: &TreeDescription) -> Self {
        let mut graph = Self::new();
        for node in &description.nodes {
            graph.nodes.push(node.id.clone());
            for child in &node.children {
                graph
                    .children
                    .entry(node.id.clone())
                    .or_default()
                    .push(child.clone());
                graph
                    .parents
                    .entry(child.clone())
                    .or_default()
                    .push(node.id.clone());
            }
        }
        graph
    }

    pub fn children_of(&self, node_id: &str) -> &[NodeId] {
        self.children.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parents_of(&self, node_id: &str) -> &[NodeId] {
        self.parents.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Get all descendants of a node (depth-first)
    pub fn get_descendants(&self, node_id: &str) -> Vec<NodeId> {
        let mut descendants = Vec::new();
        let mut visited = HashSet::new();
        self.collect_descendants(node_id, &mut descendants, &mut visited);
        descendants
    }

    fn collect_descendants(
        &self,
        node_id: &str,
        descendants: &mut Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
    ) {
        if !visited.insert(node_id.to_string()) {
            return;
        }
        for child_id in self.children_of(node_id) {
            if !visited.contains(child_id) {
                descendants.push(child_id.clone());
            }
            self.collect_descendants(child_id, descendants, visited);
        }
    }

    /// Get all ancestors of a node (nodes whose routing depends on it)
    pub fn get_ancestors(&self, node_id: &str) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut visited = HashSet::new();
        self.collect_ancestors(node_id, &mut ancestors, &mut visited);
        ancestors
    }

    fn collect_ancestors(
        &self,
        node_id: &str,
        ancestors: &mut Vec<NodeId>,
        visited: &mut HashSet<NodeId>,
    ) {
        if !visited.insert(node_id.to_string()) {
            return;
        }
        for parent_id in self.parents_of(node_id) {
            if !visited.contains(parent_id) {
                ancestors.push(parent_id.clone());
            }
            self.collect_ancestors(parent_id, ancestors, visited);
        }
    }

    /// First node found on a cycle, if any
    pub fn find_cycle(&self) -> Option<NodeId> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Open,
            Done,
        }

        let mut marks: AHashMap<&str, Mark> = AHashMap::new();
        for start in &self.nodes {
            if marks.contains_key(start.as_str()) {
                continue;
            }
            // Iterative DFS: (node, next child position)
            let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];
            marks.insert(start.as_str(), Mark::Open);
            while let Some((node, position)) = stack.pop() {
                let children = self.children_of(node);
                if let Some(child) = children.get(position) {
                    stack.push((node, position + 1));
                    match marks.get(child.as_str()) {
                        Some(Mark::Open) => return Some(child.clone()),
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(child.as_str(), Mark::Open);
                            stack.push((child.as_str(), 0));
                        }
                    }
                } else {
                    marks.insert(node, Mark::Done);
                }
            }
        }
        None
    }

    /// Check if a node exists in the graph
    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.iter().any(|id| id == node_id)
    }

    /// Get all node IDs
    pub fn all_nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

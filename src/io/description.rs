// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Declarative tree descriptions
//!
//! Nodes are listed flat and reference their children by id, so the same
//! document can describe several trees.

use super::dependency_graph::DependencyGraph;
use crate::csg::{BrushMeshId, CsgHierarchy, NodeHandle, NodeVariant};
use crate::routing::OperationKind;
use ahash::{AHashMap, AHashSet};
use anyhow::{bail, Context, Result};
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// A document describing one or more CSG trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDescription {
    #[serde(default)]
    pub name: String,
    /// Ids of the trees to build; every `tree` node when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trees: Vec<String>,
    pub nodes: Vec<NodeDescription>,
}

/// One described node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub id: String,
    pub kind: NodeVariant,
    #[serde(default)]
    pub operation: OperationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<BrushMeshId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

/// Structural problems found in a description
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptionError {
    #[error("node id '{0}' is declared more than once")]
    DuplicateId(String),

    #[error("node '{parent}' references unknown child '{child}'")]
    UnknownChild { parent: String, child: String },

    #[error("node '{child}' is listed more than once under '{parent}'")]
    DuplicateChild { parent: String, child: String },

    #[error("node '{child}' is listed under both '{first}' and '{second}'")]
    MultipleParents {
        child: String,
        first: String,
        second: String,
    },

    #[error("tree '{child}' cannot be a child of '{parent}'")]
    TreeAsChild { parent: String, child: String },

    #[error("brush '{0}' cannot have children")]
    BrushWithChildren(String),

    #[error("cycle detected at node '{0}'")]
    Cycle(String),

    #[error("'{0}' is not a tree node")]
    NotATree(String),

    #[error("description contains no trees")]
    NoTrees,
}

/// Handles of a description built into a hierarchy
#[derive(Debug, Clone, Default)]
pub struct BuiltTrees {
    /// Built trees in order, with their ids
    pub trees: Vec<(String, NodeHandle)>,
    /// Every built node by id
    pub handles: AHashMap<String, NodeHandle>,
}

impl BuiltTrees {
    pub fn handle(&self, id: &str) -> Option<NodeHandle> {
        self.handles.get(id).copied()
    }

    pub fn tree(&self, id: &str) -> Option<NodeHandle> {
        self.trees.iter().find(|(tree_id, _)| tree_id == id).map(|(_, h)| *h)
    }

    /// Id of the node behind `handle`
    pub fn id_of(&self, handle: NodeHandle) -> Option<&str> {
        self.handles
            .iter()
            .find(|(_, h)| **h == handle)
            .map(|(id, _)| id.as_str())
    }
}

impl TreeDescription {
    pub fn from_json_str(source: &str) -> Result<Self> {
        serde_json::from_str(source).context("Failed to parse JSON tree description")
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).context("Failed to parse TOML tree description")
    }

    /// Load a `.json` or `.toml` description
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read description: {:?}", path))?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let description = match extension.as_deref() {
            Some("json") => Self::from_json_str(&source),
            Some("toml") => Self::from_toml_str(&source),
            _ => bail!("Unsupported description format: {:?}", path),
        };
        description.with_context(|| format!("Failed to load description: {:?}", path))
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize tree description")
    }

    pub fn node(&self, id: &str) -> Option<&NodeDescription> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Ids of the trees to build
    pub fn tree_ids(&self) -> Vec<&str> {
        if self.trees.is_empty() {
            self.nodes
                .iter()
                .filter(|n| n.kind == NodeVariant::Tree)
                .map(|n| n.id.as_str())
                .collect()
        } else {
            self.trees.iter().map(String::as_str).collect()
        }
    }

    /// Check ids, child references and the parent/child structure
    pub fn validate(&self) -> Result<(), DescriptionError> {
        let mut kinds: AHashMap<&str, NodeVariant> = AHashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if kinds.insert(node.id.as_str(), node.kind).is_some() {
                return Err(DescriptionError::DuplicateId(node.id.clone()));
            }
        }

        let mut parent_of: AHashMap<&str, &str> = AHashMap::new();
        for node in &self.nodes {
            if node.kind == NodeVariant::Brush && !node.children.is_empty() {
                return Err(DescriptionError::BrushWithChildren(node.id.clone()));
            }
            let mut listed = AHashSet::with_capacity(node.children.len());
            for child in &node.children {
                let Some(kind) = kinds.get(child.as_str()) else {
                    return Err(DescriptionError::UnknownChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                };
                if !listed.insert(child.as_str()) {
                    return Err(DescriptionError::DuplicateChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                }
                if *kind == NodeVariant::Tree {
                    return Err(DescriptionError::TreeAsChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                }
                if let Some(first) = parent_of.insert(child.as_str(), node.id.as_str()) {
                    return Err(DescriptionError::MultipleParents {
                        child: child.clone(),
                        first: first.to_string(),
                        second: node.id.clone(),
                    });
                }
            }
        }

        if let Some(node) = DependencyGraph::from_description(self).find_cycle() {
            return Err(DescriptionError::Cycle(node));
        }

        let trees = self.tree_ids();
        if trees.is_empty() {
            return Err(DescriptionError::NoTrees);
        }
        for tree in trees {
            if kinds.get(tree) != Some(&NodeVariant::Tree) {
                return Err(DescriptionError::NotATree(tree.to_string()));
            }
        }
        Ok(())
    }

    /// Ids of nodes not reachable from any built tree
    pub fn unreachable(&self) -> Vec<&str> {
        let graph = DependencyGraph::from_description(self);
        let mut reachable: AHashSet<String> = AHashSet::new();
        for tree in self.tree_ids() {
            reachable.insert(tree.to_string());
            reachable.extend(graph.get_descendants(tree));
        }
        self.nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !reachable.contains(*id))
            .collect()
    }

    /// Validate and create every described node in `hierarchy`
    pub fn build(&self, hierarchy: &mut CsgHierarchy) -> Result<BuiltTrees> {
        self.validate()
            .with_context(|| format!("Invalid tree description '{}'", self.name))?;
        for id in self.unreachable() {
            log::warn!("node '{}' is not reachable from any tree", id);
        }

        let mut built = BuiltTrees::default();
        for node in &self.nodes {
            let handle = match node.kind {
                NodeVariant::Tree => hierarchy.create_tree(),
                NodeVariant::Branch => hierarchy.create_branch(node.operation),
                NodeVariant::Brush => {
                    let transform = node
                        .translation
                        .map(|[x, y, z]| Matrix4::new_translation(&Vector3::new(x, y, z)))
                        .unwrap_or_else(Matrix4::identity);
                    hierarchy.create_brush(node.operation, node.mesh, transform)
                }
            };
            built.handles.insert(node.id.clone(), handle);
        }

        for node in &self.nodes {
            if node.children.is_empty() {
                continue;
            }
            let parent = built.handles[&node.id];
            let children = node
                .children
                .iter()
                .map(|child| built.handles[child])
                .collect();
            hierarchy
                .set_children(parent, children)
                .with_context(|| format!("Failed to attach children of '{}'", node.id))?;
        }

        for tree in self.tree_ids() {
            built.trees.push((tree.to_string(), built.handles[tree]));
        }
        log::debug!(
            "built description '{}': {} nodes, {} trees",
            self.name,
            built.handles.len(),
            built.trees.len()
        );
        Ok(built)
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Immutable, validated tree snapshots
//!
//! An evaluation pass never reads the node store directly: it captures the
//! tree once, rejecting structural corruption before any table is built.

use super::{BrushMeshId, NodeHandle, NodeKind, NodeSource, NodeVariant};
use crate::error::{CsgError, CsgResult};
use crate::routing::OperationKind;
use ahash::{AHashMap, AHashSet};

/// One node of a snapshot, stored in pre-order
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotNode {
    pub handle: NodeHandle,
    pub variant: NodeVariant,
    /// Operation against the preceding siblings (`Additive` for the root)
    pub operation: OperationKind,
    pub mesh: Option<BrushMeshId>,
    pub parent: Option<u32>,
    /// One past the last descendant
    pub end: u32,
    /// First live child of its parent
    pub first_child: bool,
    pub depth: u32,
}

impl SnapshotNode {
    pub fn is_brush(&self) -> bool {
        self.variant == NodeVariant::Brush
    }

    pub fn descendant_count(&self, index: usize) -> usize {
        self.end as usize - index - 1
    }

    /// Contributes no geometry: a brush without mesh or a node without children
    pub fn is_empty(&self, index: usize) -> bool {
        match self.variant {
            NodeVariant::Brush => self.mesh.is_none(),
            NodeVariant::Branch | NodeVariant::Tree => self.descendant_count(index) == 0,
        }
    }
}

/// Pre-order copy of one tree's live structure
#[derive(Debug, Clone, PartialEq)]
pub struct TreeSnapshot {
    tree: NodeHandle,
    nodes: Vec<SnapshotNode>,
    index: AHashMap<NodeHandle, u32>,
}

impl TreeSnapshot {
    /// Capture and validate the tree rooted at `tree`.
    ///
    /// Stale child handles are skipped; cycles, duplicate children, nodes
    /// under two parents and trees used as children are rejected.
    pub fn capture<S: NodeSource + ?Sized>(
        source: &S,
        tree: NodeHandle,
        max_depth: usize,
    ) -> CsgResult<Self> {
        let root = source.node(tree).ok_or(CsgError::StaleHandle(tree))?;
        if root.variant() != NodeVariant::Tree {
            return Err(CsgError::NotATree(tree));
        }

        let mut capture = Capture {
            source,
            nodes: Vec::new(),
            index: AHashMap::new(),
            on_path: AHashSet::new(),
            max_depth,
        };
        capture.visit(tree, None, false, 0)?;

        log::trace!("captured tree {} with {} nodes", tree, capture.nodes.len());
        Ok(Self {
            tree,
            nodes: capture.nodes,
            index: capture.index,
        })
    }

    pub fn tree(&self) -> NodeHandle {
        self.tree
    }

    pub fn nodes(&self) -> &[SnapshotNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&SnapshotNode> {
        self.nodes.get(index)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, handle: NodeHandle) -> Option<usize> {
        self.index.get(&handle).map(|i| *i as usize)
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.index.contains_key(&handle)
    }

    /// Indices of the direct children of `index`, in declared order
    pub fn children(&self, index: usize) -> Children<'_> {
        let end = self.nodes.get(index).map(|n| n.end as usize).unwrap_or(0);
        Children {
            nodes: &self.nodes,
            next: index + 1,
            end,
        }
    }

    /// Ancestors of `index`, nearest first, ending with the root
    pub fn ancestors(&self, index: usize) -> Vec<usize> {
        let mut path = Vec::new();
        let mut current = self.nodes.get(index).and_then(|n| n.parent);
        while let Some(parent) = current {
            path.push(parent as usize);
            current = self.nodes[parent as usize].parent;
        }
        path
    }

    /// Brush indices in traversal order
    pub fn brushes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_brush())
            .map(|(i, _)| i)
    }

    pub fn brush_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_brush()).count()
    }

    /// Node indices with every child before its parent
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut pending: Vec<usize> = Vec::new();
        for index in 0..self.nodes.len() {
            // Close every open node whose subtree ends here
            while let Some(top) = pending.last() {
                if self.nodes[*top].end as usize <= index {
                    order.push(*top);
                    pending.pop();
                } else {
                    break;
                }
            }
            pending.push(index);
        }
        while let Some(top) = pending.pop() {
            order.push(top);
        }
        order
    }
}

/// Iterator over the direct children of a snapshot node
pub struct Children<'a> {
    nodes: &'a [SnapshotNode],
    next: usize,
    end: usize,
}

impl Iterator for Children<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.end {
            return None;
        }
        let current = self.next;
        self.next = self.nodes[current].end as usize;
        Some(current)
    }
}

struct Capture<'a, S: ?Sized> {
    source: &'a S,
    nodes: Vec<SnapshotNode>,
    index: AHashMap<NodeHandle, u32>,
    on_path: AHashSet<NodeHandle>,
    max_depth: usize,
}

impl<S: NodeSource + ?Sized> Capture<'_, S> {
    fn visit(
        &mut self,
        handle: NodeHandle,
        parent: Option<u32>,
        first_child: bool,
        depth: usize,
    ) -> CsgResult<()> {
        if depth > self.max_depth {
            return Err(CsgError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        let source = self.source;
        let node = source.node(handle).ok_or(CsgError::StaleHandle(handle))?;

        let position = self.nodes.len() as u32;
        self.nodes.push(SnapshotNode {
            handle,
            variant: node.variant(),
            operation: node.kind.operation().unwrap_or_default(),
            mesh: node.kind.mesh(),
            parent,
            end: position + 1,
            first_child,
            depth: depth as u32,
        });
        self.index.insert(handle, position);
        self.on_path.insert(handle);

        let mut listed = AHashSet::new();
        let mut first = true;
        for &child in node.children() {
            if !listed.insert(child) {
                return Err(CsgError::DuplicateChild {
                    parent: handle,
                    child,
                });
            }
            if self.on_path.contains(&child) {
                return Err(CsgError::Cycle { node: child });
            }
            let Some(child_node) = source.node(child) else {
                log::warn!("skipping stale child {} of {}", child, handle);
                continue;
            };
            if matches!(child_node.kind, NodeKind::Tree { .. }) {
                return Err(CsgError::InvalidChild {
                    parent: handle,
                    child,
                });
            }
            if let Some(seen) = self.index.get(&child) {
                let existing = self.nodes[*seen as usize]
                    .parent
                    .map(|p| self.nodes[p as usize].handle)
                    .unwrap_or(self.nodes[0].handle);
                return Err(CsgError::MultipleParents {
                    child,
                    existing,
                    parent: handle,
                });
            }
            if let Some(recorded) = child_node.parent {
                if recorded != handle {
                    return Err(CsgError::MultipleParents {
                        child,
                        existing: recorded,
                        parent: handle,
                    });
                }
            }
            self.visit(child, Some(position), first, depth + 1)?;
            first = false;
        }

        self.on_path.remove(&handle);
        self.nodes[position as usize].end = self.nodes.len() as u32;
        Ok(())
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Generational node store for CSG trees
//!
//! Every mutation validates the structure it produces, so a hierarchy never
//! holds a cycle, a duplicate child or a node under two parents.

use super::{BrushMeshId, CsgNode, NodeHandle, NodeKind, NodeSource, NodeVariant};
use crate::error::{CsgError, CsgResult};
use crate::routing::OperationKind;
use ahash::AHashSet;
use nalgebra::Matrix4;

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<CsgNode>,
}

/// Arena of CSG nodes addressed by generation-checked handles
#[derive(Debug, Clone, Default)]
pub struct CsgHierarchy {
    slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
}

impl CsgHierarchy {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate(&mut self, node: CsgNode) -> NodeHandle {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            return NodeHandle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            node: Some(node),
        });
        NodeHandle::new(index, 0)
    }

    pub fn create_tree(&mut self) -> NodeHandle {
        self.allocate(CsgNode::tree())
    }

    pub fn create_branch(&mut self, operation: OperationKind) -> NodeHandle {
        self.allocate(CsgNode::branch(operation))
    }

    pub fn create_brush(
        &mut self,
        operation: OperationKind,
        mesh: Option<BrushMeshId>,
        transform: Matrix4<f64>,
    ) -> NodeHandle {
        self.allocate(CsgNode::brush(operation, mesh, transform))
    }

    /// Destroy a node. Its children stay alive as detached roots.
    pub fn destroy(&mut self, handle: NodeHandle) -> CsgResult<()> {
        let node = self.get(handle).ok_or(CsgError::StaleHandle(handle))?;
        let parent = node.parent;
        let children = node.children().to_vec();

        if let Some(parent) = parent {
            if let Some(siblings) = self.get_mut(parent).and_then(|p| p.kind.children_mut()) {
                siblings.retain(|c| *c != handle);
            }
            self.mark_dirty(parent);
        }
        for child in children {
            if let Some(child_node) = self.get_mut(child) {
                child_node.parent = None;
                child_node.dirty = true;
            }
        }

        let slot = &mut self.slots[handle.index() as usize];
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(handle.index());
        self.live -= 1;
        log::trace!("destroyed node {}", handle);
        Ok(())
    }

    /// Destroy a node and everything below it, returning how many nodes went away
    pub fn destroy_recursive(&mut self, handle: NodeHandle) -> CsgResult<usize> {
        if !self.is_valid(handle) {
            return Err(CsgError::StaleHandle(handle));
        }
        let mut stack = vec![handle];
        let mut order = Vec::new();
        while let Some(current) = stack.pop() {
            order.push(current);
            stack.extend(self.children(current).iter().copied());
        }
        // Leaves first so every destroy sees a live parent
        for node in order.iter().rev() {
            self.destroy(*node)?;
        }
        Ok(order.len())
    }

    pub fn get(&self, handle: NodeHandle) -> Option<&CsgNode> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.node.as_ref())
    }

    fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut CsgNode> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.node.as_mut())
    }

    fn get_mut_checked(&mut self, handle: NodeHandle) -> CsgResult<&mut CsgNode> {
        self.get_mut(handle).ok_or(CsgError::StaleHandle(handle))
    }

    pub fn is_valid(&self, handle: NodeHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn variant(&self, handle: NodeHandle) -> Option<NodeVariant> {
        self.get(handle).map(|n| n.variant())
    }

    pub fn parent(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.get(handle).and_then(|n| n.parent)
    }

    /// Ordered children, empty for brushes and stale handles
    pub fn children(&self, handle: NodeHandle) -> &[NodeHandle] {
        self.get(handle).map(|n| n.children()).unwrap_or(&[])
    }

    pub fn operation(&self, handle: NodeHandle) -> Option<OperationKind> {
        self.get(handle).and_then(|n| n.kind.operation())
    }

    pub fn set_operation(&mut self, handle: NodeHandle, op: OperationKind) -> CsgResult<()> {
        match &mut self.get_mut_checked(handle)?.kind {
            NodeKind::Branch { operation, .. } | NodeKind::Brush { operation, .. } => {
                *operation = op;
            }
            NodeKind::Tree { .. } => return Err(CsgError::NoOperation(handle)),
        }
        self.mark_dirty(handle);
        Ok(())
    }

    pub fn set_mesh(&mut self, handle: NodeHandle, new_mesh: Option<BrushMeshId>) -> CsgResult<()> {
        match &mut self.get_mut_checked(handle)?.kind {
            NodeKind::Brush { mesh, .. } => *mesh = new_mesh,
            _ => return Err(CsgError::NotABrush(handle)),
        }
        self.mark_dirty(handle);
        Ok(())
    }

    pub fn set_transform(&mut self, handle: NodeHandle, matrix: Matrix4<f64>) -> CsgResult<()> {
        match &mut self.get_mut_checked(handle)?.kind {
            NodeKind::Brush { transform, .. } => *transform = matrix,
            _ => return Err(CsgError::NotABrush(handle)),
        }
        self.mark_dirty(handle);
        Ok(())
    }

    /// Whether `ancestor` lies on the parent chain of `node`
    pub fn is_ancestor(&self, ancestor: NodeHandle, node: NodeHandle) -> bool {
        let mut current = self.parent(node);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.live {
                break;
            }
            current = self.parent(parent);
        }
        false
    }

    fn check_attach(&self, parent: NodeHandle, child: NodeHandle) -> CsgResult<()> {
        let parent_node = self.get(parent).ok_or(CsgError::StaleHandle(parent))?;
        let child_node = self.get(child).ok_or(CsgError::StaleHandle(child))?;

        if !parent_node.kind.can_hold_children() {
            return Err(CsgError::NotABranch(parent));
        }
        if child_node.variant() == NodeVariant::Tree {
            return Err(CsgError::InvalidChild { parent, child });
        }
        if child == parent || self.is_ancestor(child, parent) {
            return Err(CsgError::Cycle { node: child });
        }
        match child_node.parent {
            Some(existing) if existing == parent => Err(CsgError::DuplicateChild { parent, child }),
            Some(existing) => Err(CsgError::MultipleParents {
                child,
                existing,
                parent,
            }),
            None => Ok(()),
        }
    }

    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> CsgResult<()> {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child)
    }

    /// Insert `child` at `index` (clamped to the child count)
    pub fn insert_child(&mut self, parent: NodeHandle, index: usize, child: NodeHandle) -> CsgResult<()> {
        self.check_attach(parent, child)?;
        if let Some(children) = self.get_mut_checked(parent)?.kind.children_mut() {
            let index = index.min(children.len());
            children.insert(index, child);
        }
        let child_node = self.get_mut_checked(child)?;
        child_node.parent = Some(parent);
        child_node.dirty = true;
        self.mark_dirty(parent);
        Ok(())
    }

    /// Detach `child` from `parent`; returns false when it was not a child
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> CsgResult<bool> {
        let children = self
            .get_mut_checked(parent)?
            .kind
            .children_mut()
            .ok_or(CsgError::NotABranch(parent))?;
        let before = children.len();
        children.retain(|c| *c != child);
        if children.len() == before {
            return Ok(false);
        }
        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = None;
            child_node.dirty = true;
        }
        self.mark_dirty(parent);
        Ok(true)
    }

    /// Replace the full child list, validating it before anything changes
    pub fn set_children(&mut self, parent: NodeHandle, children: Vec<NodeHandle>) -> CsgResult<()> {
        let parent_node = self.get(parent).ok_or(CsgError::StaleHandle(parent))?;
        if !parent_node.kind.can_hold_children() {
            return Err(CsgError::NotABranch(parent));
        }
        let current: AHashSet<NodeHandle> = parent_node.children().iter().copied().collect();

        let mut seen = AHashSet::with_capacity(children.len());
        for child in &children {
            if !seen.insert(*child) {
                return Err(CsgError::DuplicateChild {
                    parent,
                    child: *child,
                });
            }
            if current.contains(child) {
                continue;
            }
            self.check_attach(parent, *child)?;
        }

        for old in current.difference(&seen) {
            if let Some(node) = self.get_mut(*old) {
                node.parent = None;
                node.dirty = true;
            }
        }
        for child in &children {
            if let Some(node) = self.get_mut(*child) {
                node.parent = Some(parent);
                node.dirty = true;
            }
        }
        if let Some(list) = self.get_mut_checked(parent)?.kind.children_mut() {
            *list = children;
        }
        self.mark_dirty(parent);
        Ok(())
    }

    /// Mark a node and all of its ancestors dirty
    pub fn mark_dirty(&mut self, handle: NodeHandle) {
        let mut current = Some(handle);
        let mut steps = 0;
        while let Some(node_handle) = current {
            let Some(node) = self.get_mut(node_handle) else {
                break;
            };
            node.dirty = true;
            current = node.parent;
            steps += 1;
            if steps > self.live {
                break;
            }
        }
    }

    pub fn is_dirty(&self, handle: NodeHandle) -> bool {
        self.get(handle).map(|n| n.dirty).unwrap_or(false)
    }

    /// Clear dirty flags of a node and its whole subtree
    pub fn clear_dirty(&mut self, handle: NodeHandle) {
        let mut stack = vec![handle];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.get_mut(current) {
                node.dirty = false;
                stack.extend(node.children().iter().copied());
            }
        }
    }

    /// Topmost ancestor of `handle` (itself when detached)
    pub fn root_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        if !self.is_valid(handle) {
            return None;
        }
        let mut current = handle;
        let mut steps = 0;
        while let Some(parent) = self.parent(current) {
            current = parent;
            steps += 1;
            if steps > self.live {
                break;
            }
        }
        Some(current)
    }

    /// Tree containing `handle`, if it is attached to one
    pub fn tree_of(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.root_of(handle)
            .filter(|root| self.variant(*root) == Some(NodeVariant::Tree))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &CsgNode)> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node
                .as_ref()
                .map(|node| (NodeHandle::new(index as u32, slot.generation), node))
        })
    }

    /// Every live tree root
    pub fn trees(&self) -> Vec<NodeHandle> {
        self.iter()
            .filter(|(_, node)| node.variant() == NodeVariant::Tree)
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Tree roots flagged dirty
    pub fn dirty_trees(&self) -> Vec<NodeHandle> {
        self.iter()
            .filter(|(_, node)| node.variant() == NodeVariant::Tree && node.dirty)
            .map(|(handle, _)| handle)
            .collect()
    }

    /// Brushes below `root` in traversal order (depth first, declared order)
    pub fn brushes_in_order(&self, root: NodeHandle) -> Vec<NodeHandle> {
        let mut brushes = Vec::new();
        let mut stack = vec![root];
        while let Some(current) = stack.pop() {
            let Some(node) = self.get(current) else {
                continue;
            };
            if node.variant() == NodeVariant::Brush {
                brushes.push(current);
            }
            stack.extend(node.children().iter().rev().copied());
        }
        brushes
    }
}

impl NodeSource for CsgHierarchy {
    fn node(&self, handle: NodeHandle) -> Option<&CsgNode> {
        self.get(handle)
    }
}

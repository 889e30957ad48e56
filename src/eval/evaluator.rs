// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tree evaluator - converts CSG trees to routing tables

use super::routing::TreeRouting;
use super::selector::{effective_family, needs_dedicated, SameMeshOverlap, TableFamilySelector};
use crate::config::RoutingConfig;
use crate::csg::{NodeHandle, NodeSource, SnapshotNode, TreeSnapshot};
use crate::error::{CsgError, CsgResult};
use crate::routing::{
    trim_noop_rows, Category, OperationKind, RoutingRow, RoutingTable, TableFamily, CATEGORY_COUNT,
};
use ahash::AHashMap;
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked between node visits
pub type CancelFlag = Arc<AtomicBool>;

/// Rows of one node, indexed by the incoming left-hand category.
///
/// A first child seeds its parent's fold: it is read through the regular
/// additive table, whose `Outside` row is the identity.
pub fn node_rows(node: &SnapshotNode, index: usize, family: TableFamily) -> [RoutingRow; CATEGORY_COUNT] {
    let (family, op) = if node.first_child || node.parent.is_none() {
        (TableFamily::Regular, OperationKind::Additive)
    } else {
        (family, node.operation)
    };
    let own = if node.is_empty(index) {
        RoutingRow::uniform(Category::Outside)
    } else {
        RoutingRow::IDENTITY
    };
    Category::ALL.map(|left| RoutingRow::compose(family, op, left, &own))
}

/// Builds routing tables for whole trees
#[derive(Debug, Clone)]
pub struct TreeEvaluator {
    config: RoutingConfig,
    selector: Arc<dyn TableFamilySelector>,
    cancel: Option<CancelFlag>,
}

impl TreeEvaluator {
    pub fn new() -> Self {
        Self {
            config: RoutingConfig::default(),
            selector: Arc::new(SameMeshOverlap),
            cancel: None,
        }
    }

    /// Evaluator using the selector implied by `config.overlap_policy`
    pub fn with_config(config: RoutingConfig) -> Self {
        let selector = config.selector();
        Self {
            config,
            selector,
            cancel: None,
        }
    }

    pub fn with_selector(mut self, selector: Arc<dyn TableFamilySelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn selector(&self) -> &Arc<dyn TableFamilySelector> {
        &self.selector
    }

    /// Capture `tree` from `source` and build its routing
    pub fn evaluate<S: NodeSource + ?Sized>(&self, source: &S, tree: NodeHandle) -> CsgResult<TreeRouting> {
        let snapshot = TreeSnapshot::capture(source, tree, self.config.max_depth)?;
        self.evaluate_snapshot(Arc::new(snapshot))
    }

    /// Build the shared table and every dedicated per-origin table
    pub fn evaluate_snapshot(&self, snapshot: Arc<TreeSnapshot>) -> CsgResult<TreeRouting> {
        let shared = Arc::new(self.build_table(&snapshot, None)?);

        let origins: Vec<usize> = snapshot
            .brushes()
            .filter(|origin| needs_dedicated(self.selector.as_ref(), &snapshot, *origin))
            .collect();

        let build = |origin: &usize| -> CsgResult<(NodeHandle, Arc<RoutingTable>)> {
            let table = self.build_table(&snapshot, Some(*origin))?;
            Ok((snapshot.nodes()[*origin].handle, Arc::new(table)))
        };

        let built = if snapshot.brush_count() >= self.config.parallel_threshold {
            origins.par_iter().map(build).collect::<CsgResult<Vec<_>>>()?
        } else {
            origins.iter().map(build).collect::<CsgResult<Vec<_>>>()?
        };
        let dedicated: AHashMap<NodeHandle, Arc<RoutingTable>> = built.into_iter().collect();

        let mut slots = vec![0u32; snapshot.len()];
        for (slot, index) in snapshot.post_order().into_iter().enumerate() {
            slots[index] = slot as u32;
        }

        log::debug!(
            "evaluated tree {}: {} nodes, {} rows, {} dedicated tables",
            snapshot.tree(),
            snapshot.len(),
            shared.row_count(),
            dedicated.len()
        );

        Ok(TreeRouting::new(snapshot, shared, dedicated, slots, Arc::clone(&self.selector)))
    }

    /// Append every node's rows in post-order.
    ///
    /// `origin` selects the table families for one originating brush; `None`
    /// builds the regular table shared by all other origins.
    pub fn build_table(&self, snapshot: &TreeSnapshot, origin: Option<usize>) -> CsgResult<RoutingTable> {
        let mut table = RoutingTable::with_capacity(snapshot.len());
        for index in snapshot.post_order() {
            self.check_cancelled()?;
            let node = &snapshot.nodes()[index];
            if node.parent.is_none() {
                table.push_empty(node.handle);
                continue;
            }
            let family = effective_family(self.selector.as_ref(), snapshot, origin, index);
            let rows = node_rows(node, index, family);
            if self.config.compact_rows {
                table.push_node(node.handle, trim_noop_rows(&rows));
            } else {
                table.push_node(node.handle, &rows);
            }
        }
        Ok(table)
    }

    fn check_cancelled(&self) -> CsgResult<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(CsgError::Cancelled),
            _ => Ok(()),
        }
    }
}

impl Default for TreeEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::{BrushMeshId, CsgHierarchy};
    use crate::eval::RegularOnly;
    use nalgebra::Matrix4;
    use Category::*;

    fn brush(h: &mut CsgHierarchy, op: OperationKind, mesh: u32) -> NodeHandle {
        h.create_brush(op, Some(BrushMeshId(mesh)), Matrix4::identity())
    }

    #[test]
    fn test_node_rows_follow_tables() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        let b = brush(&mut h, OperationKind::Subtractive, 2);
        let empty = h.create_brush(OperationKind::Additive, None, Matrix4::identity());
        h.set_children(tree, vec![a, b, empty]).unwrap();
        let snapshot = TreeSnapshot::capture(&h, tree, 16).unwrap();

        // First child passes its own category through from Outside
        let first = node_rows(&snapshot.nodes()[1], 1, TableFamily::Regular);
        assert_eq!(first[Outside.index()], RoutingRow::IDENTITY);

        let second = node_rows(&snapshot.nodes()[2], 2, TableFamily::Regular);
        assert_eq!(second[Inside.index()], RoutingRow::new(Outside, ReverseAligned, Aligned, Inside));
        assert_eq!(second[Outside.index()], RoutingRow::uniform(Outside));

        let degenerate = node_rows(&snapshot.nodes()[3], 3, TableFamily::Regular);
        for left in Category::ALL {
            assert_eq!(degenerate[left.index()], RoutingRow::uniform(left));
        }
    }

    #[test]
    fn test_post_order_layout_and_compaction() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        let branch = h.create_branch(OperationKind::Intersecting);
        let b = brush(&mut h, OperationKind::Additive, 2);
        h.set_children(tree, vec![a, branch]).unwrap();
        h.add_child(branch, b).unwrap();
        let snapshot = TreeSnapshot::capture(&h, tree, 16).unwrap();

        let compact = TreeEvaluator::new().build_table(&snapshot, None).unwrap();
        assert_eq!(compact.nodes(), &[a, b, branch, tree]);
        assert!(compact.lookup(3).unwrap().is_empty());

        let config = RoutingConfig {
            compact_rows: false,
            ..RoutingConfig::default()
        };
        let full = TreeEvaluator::with_config(config).build_table(&snapshot, None).unwrap();
        assert!(full.row_count() > compact.row_count());
        for slot in 0..full.node_count() {
            for c in Category::ALL {
                assert_eq!(full.route(slot, c), compact.route(slot, c));
            }
        }
    }

    #[test]
    fn test_dedicated_tables_only_for_overlapping_origins() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        let b = brush(&mut h, OperationKind::Additive, 2);
        let dup = brush(&mut h, OperationKind::Additive, 1);
        h.set_children(tree, vec![a, b, dup]).unwrap();

        let routing = TreeEvaluator::new().evaluate(&h, tree).unwrap();
        assert!(routing.has_dedicated(a));
        assert!(!routing.has_dedicated(b));
        assert!(!routing.has_dedicated(dup));

        let regular = TreeEvaluator::new()
            .with_selector(Arc::new(RegularOnly))
            .evaluate(&h, tree)
            .unwrap();
        assert!(!regular.has_dedicated(a));
    }

    #[test]
    fn test_cancelled_before_build() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let a = brush(&mut h, OperationKind::Additive, 1);
        h.add_child(tree, a).unwrap();

        let flag: CancelFlag = Arc::new(AtomicBool::new(true));
        let evaluator = TreeEvaluator::new().with_cancel_flag(flag.clone());
        assert_eq!(evaluator.evaluate(&h, tree).unwrap_err(), CsgError::Cancelled);

        flag.store(false, Ordering::Relaxed);
        assert!(evaluator.evaluate(&h, tree).is_ok());
    }
}

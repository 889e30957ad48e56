// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Table family selection per originating brush

use crate::csg::TreeSnapshot;
use crate::routing::TableFamily;
use std::fmt;

/// Chooses the operation table family a node uses while fragments of
/// `origin` are routed. Indices are snapshot positions.
pub trait TableFamilySelector: Send + Sync + fmt::Debug {
    fn select(&self, snapshot: &TreeSnapshot, origin: usize, node: usize) -> TableFamily;

    fn name(&self) -> &'static str;
}

/// Later brushes sharing the origin's mesh use overlap removal, so exactly
/// one copy of a coincident surface survives: the last one.
///
/// The family is chosen for every later node whose subtree holds such a
/// brush, so the duplicate is still caught where its enclosing branch joins
/// the origin's accumulated category.
#[derive(Debug, Clone, Copy, Default)]
pub struct SameMeshOverlap;

impl TableFamilySelector for SameMeshOverlap {
    fn select(&self, snapshot: &TreeSnapshot, origin: usize, node: usize) -> TableFamily {
        if node <= origin {
            return TableFamily::Regular;
        }
        let (Some(mesh), Some(candidate)) = (snapshot.node(origin).and_then(|n| n.mesh), snapshot.node(node)) else {
            return TableFamily::Regular;
        };
        let subtree = &snapshot.nodes()[node..candidate.end as usize];
        if subtree.iter().any(|n| n.is_brush() && n.mesh == Some(mesh)) {
            TableFamily::OverlapRemoval
        } else {
            TableFamily::Regular
        }
    }

    fn name(&self) -> &'static str {
        "same_mesh"
    }
}

/// Regular tables everywhere
#[derive(Debug, Clone, Copy, Default)]
pub struct RegularOnly;

impl TableFamilySelector for RegularOnly {
    fn select(&self, _snapshot: &TreeSnapshot, _origin: usize, _node: usize) -> TableFamily {
        TableFamily::Regular
    }

    fn name(&self) -> &'static str {
        "regular_only"
    }
}

/// Family actually used for `node`: the root and first children seed their
/// fold and always read the regular tables.
pub fn effective_family(
    selector: &dyn TableFamilySelector,
    snapshot: &TreeSnapshot,
    origin: Option<usize>,
    node: usize,
) -> TableFamily {
    match (origin, snapshot.node(node)) {
        (Some(origin), Some(n)) if n.parent.is_some() && !n.first_child => {
            selector.select(snapshot, origin, node)
        }
        _ => TableFamily::Regular,
    }
}

/// Whether routing fragments of `origin` needs rows beyond the regular table
pub fn needs_dedicated(
    selector: &dyn TableFamilySelector,
    snapshot: &TreeSnapshot,
    origin: usize,
) -> bool {
    (0..snapshot.len())
        .any(|node| effective_family(selector, snapshot, Some(origin), node) != TableFamily::Regular)
}

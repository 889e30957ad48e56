// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Flattened routing tables
//!
//! A table is an append-only arena of packed rows. Every contributing node
//! owns one [`RoutingLookup`] range; the row for an incoming category `c`
//! lives at `start + c`. Queries outside the range never fail: they return
//! the no-op row for `c`.

use super::category::{Category, CATEGORY_COUNT};
use super::row::{PackedRoutingRow, RoutingRow};
use crate::csg::NodeHandle;
use std::ops::Range;

/// `[start, end)` range into a table's rows for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RoutingLookup {
    pub start: u32,
    pub end: u32,
}

impl RoutingLookup {
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub const fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Row index for `input`, if this lookup covers it
    #[inline]
    pub fn index_of(&self, input: Category) -> Option<usize> {
        if !input.is_valid() {
            return None;
        }
        let index = self.start as usize + input.index();
        (index < self.end as usize).then_some(index)
    }

    /// Row for `input`, or the no-op row when out of range
    #[inline]
    pub fn route(&self, table: &RoutingTable, input: Category) -> RoutingRow {
        match self.index_of(input).and_then(|i| table.rows.get(i)) {
            Some(packed) => packed.unpack(),
            None => RoutingRow::identity_seeded(input),
        }
    }
}

/// Flattened routing rows of every node of an evaluated tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    inputs: Vec<Category>,
    rows: Vec<PackedRoutingRow>,
    lookups: Vec<RoutingLookup>,
    nodes: Vec<NodeHandle>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve room for `nodes` nodes with a full set of rows each
    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            inputs: Vec::with_capacity(nodes * CATEGORY_COUNT),
            rows: Vec::with_capacity(nodes * CATEGORY_COUNT),
            lookups: Vec::with_capacity(nodes),
            nodes: Vec::with_capacity(nodes),
        }
    }

    /// Append a node's rows; `rows[i]` is the row for incoming category `i`.
    ///
    /// Returns the node's slot.
    pub fn push_node(&mut self, node: NodeHandle, rows: &[RoutingRow]) -> usize {
        debug_assert!(rows.len() <= CATEGORY_COUNT);
        let start = self.rows.len() as u32;
        for (i, row) in rows.iter().take(CATEGORY_COUNT).enumerate() {
            self.inputs.push(Category::from_index(i));
            self.rows.push(row.pack());
        }
        let end = self.rows.len() as u32;
        self.lookups.push(RoutingLookup::new(start, end));
        self.nodes.push(node);
        self.lookups.len() - 1
    }

    /// Append a node that routes nothing (every query falls back)
    pub fn push_empty(&mut self, node: NodeHandle) -> usize {
        self.push_node(node, &[])
    }

    /// Route `input` through the node at `slot`
    #[inline]
    pub fn route(&self, slot: usize, input: Category) -> RoutingRow {
        match self.lookups.get(slot) {
            Some(lookup) => lookup.route(self, input),
            None => RoutingRow::identity_seeded(input),
        }
    }

    pub fn lookup(&self, slot: usize) -> Option<RoutingLookup> {
        self.lookups.get(slot).copied()
    }

    /// Slot of the most recently appended lookup for `node`
    pub fn find(&self, node: NodeHandle) -> Option<usize> {
        self.nodes.iter().rposition(|n| *n == node)
    }

    pub fn row(&self, index: usize) -> Option<RoutingRow> {
        self.rows.get(index).map(|packed| packed.unpack())
    }

    pub fn rows(&self) -> impl Iterator<Item = RoutingRow> + '_ {
        self.rows.iter().map(|packed| packed.unpack())
    }

    /// Input category tag of every row
    pub fn inputs(&self) -> &[Category] {
        &self.inputs
    }

    pub fn lookups(&self) -> &[RoutingLookup] {
        &self.lookups
    }

    /// Originating node of every lookup
    pub fn nodes(&self) -> &[NodeHandle] {
        &self.nodes
    }

    pub fn node(&self, slot: usize) -> Option<NodeHandle> {
        self.nodes.get(slot).copied()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn node_count(&self) -> usize {
        self.lookups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    /// Slots of the subtree ending at `slot`, given its descendant count.
    ///
    /// Lookups are appended children-first, so a subtree is the contiguous
    /// run of slots that ends with its root.
    pub fn subtree_slots(&self, slot: usize, descendants: usize) -> Range<usize> {
        let end = (slot + 1).min(self.lookups.len());
        end.saturating_sub(descendants + 1)..end
    }

    /// Approximate heap footprint in bytes
    pub fn memory_bytes(&self) -> usize {
        self.inputs.capacity() * std::mem::size_of::<Category>()
            + self.rows.capacity() * std::mem::size_of::<PackedRoutingRow>()
            + self.lookups.capacity() * std::mem::size_of::<RoutingLookup>()
            + self.nodes.capacity() * std::mem::size_of::<NodeHandle>()
    }

    pub fn clear(&mut self) {
        self.inputs.clear();
        self.rows.clear();
        self.lookups.clear();
        self.nodes.clear();
    }
}

/// Drop trailing rows that equal their own fallback.
///
/// Lookups resolve a missing trailing row to the no-op row for its input,
/// so the trimmed slice routes every category exactly like the full one.
pub fn trim_noop_rows(rows: &[RoutingRow]) -> &[RoutingRow] {
    let mut len = rows.len();
    while len > 0 && rows[len - 1].is_noop_for(Category::from_index(len - 1)) {
        len -= 1;
    }
    &rows[..len]
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Routing rows: the unit of composition
//!
//! A row is a total function from an incoming category to an outgoing one.
//! Folding a child's row through an operation table yields another row, so
//! results can be folded up a tree without revisiting lower levels.

use super::category::{Category, CATEGORY_COUNT};
use super::operation::{OperationKind, TableFamily};
use std::fmt;
use std::ops::Index;

/// Length-4 category vector indexed by category ordinal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoutingRow([Category; CATEGORY_COUNT]);

impl RoutingRow {
    /// Maps every category to itself
    pub const IDENTITY: RoutingRow = RoutingRow(Category::ALL);

    pub const fn new(
        inside: Category,
        aligned: Category,
        reverse_aligned: Category,
        outside: Category,
    ) -> Self {
        Self([inside, aligned, reverse_aligned, outside])
    }

    pub const fn from_array(entries: [Category; CATEGORY_COUNT]) -> Self {
        Self(entries)
    }

    /// Row producing `category` whatever the input
    pub const fn uniform(category: Category) -> Self {
        Self([category; CATEGORY_COUNT])
    }

    /// No-op row for an incoming category: passes `category` through
    /// untouched. `Invalid` falls back to the identity row.
    pub const fn identity_seeded(category: Category) -> Self {
        if category.is_valid() {
            Self::uniform(category)
        } else {
            Self::IDENTITY
        }
    }

    /// Entry for `input`; `Invalid` in, `Invalid` out
    #[inline]
    pub fn get(&self, input: Category) -> Category {
        if input.is_valid() {
            self.0[input.index()]
        } else {
            Category::Invalid
        }
    }

    #[inline]
    pub const fn as_array(&self) -> &[Category; CATEGORY_COUNT] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Category> + '_ {
        self.0.iter().copied()
    }

    /// Fold `right` against a known left-hand category:
    /// `new[i] = table[op][left][right[i]]`
    pub fn compose(
        family: TableFamily,
        op: OperationKind,
        left: Category,
        right: &RoutingRow,
    ) -> RoutingRow {
        let table = family.table(op);
        let mut out = [Category::Invalid; CATEGORY_COUNT];
        if !left.is_valid() {
            return RoutingRow(out);
        }
        let left_row = &table[left.index()];
        for (slot, entry) in out.iter_mut().zip(right.0.iter()) {
            if entry.is_valid() {
                *slot = left_row[entry.index()];
            }
        }
        RoutingRow(out)
    }

    /// Elementwise combination: `new[i] = table[op][left[i]][right[i]]`.
    ///
    /// With a uniform `left` this is exactly [`RoutingRow::compose`].
    pub fn combine(
        family: TableFamily,
        op: OperationKind,
        left: &RoutingRow,
        right: &RoutingRow,
    ) -> RoutingRow {
        let mut out = [Category::Invalid; CATEGORY_COUNT];
        for (slot, (l, r)) in out.iter_mut().zip(left.0.iter().zip(right.0.iter())) {
            *slot = family.apply(op, *l, *r);
        }
        RoutingRow(out)
    }

    /// Chain two rows: `new[i] = outer[self[i]]`
    pub fn then(&self, outer: &RoutingRow) -> RoutingRow {
        let mut out = [Category::Invalid; CATEGORY_COUNT];
        for (slot, entry) in out.iter_mut().zip(self.0.iter()) {
            *slot = outer.get(*entry);
        }
        RoutingRow(out)
    }

    /// All four entries are the same category
    pub fn is_uniform(&self) -> bool {
        self.0.iter().all(|c| *c == self.0[0])
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// Every entry is one of the four valid categories
    pub fn is_closed(&self) -> bool {
        self.0.iter().all(|c| c.is_valid())
    }

    /// Whether this row behaves as a no-op for incoming `category`
    pub fn is_noop_for(&self, category: Category) -> bool {
        *self == Self::identity_seeded(category)
    }

    pub fn pack(&self) -> PackedRoutingRow {
        PackedRoutingRow::from(*self)
    }
}

impl Default for RoutingRow {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Index<Category> for RoutingRow {
    type Output = Category;

    /// Panics on `Invalid`; use [`RoutingRow::get`] for untrusted input.
    fn index(&self, category: Category) -> &Category {
        &self.0[category.index()]
    }
}

impl From<[Category; CATEGORY_COUNT]> for RoutingRow {
    fn from(entries: [Category; CATEGORY_COUNT]) -> Self {
        Self(entries)
    }
}

impl fmt::Display for RoutingRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{},{},{},{}}}",
            self.0[0].symbol(),
            self.0[1].symbol(),
            self.0[2].symbol(),
            self.0[3].symbol()
        )
    }
}

const NIBBLE_INVALID: u16 = 0xF;

/// Routing row packed into 16 bits, one nibble per entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackedRoutingRow(u16);

impl PackedRoutingRow {
    #[inline]
    pub const fn bits(self) -> u16 {
        self.0
    }

    #[inline]
    pub fn get(self, input: Category) -> Category {
        if !input.is_valid() {
            return Category::Invalid;
        }
        decode_nibble((self.0 >> (input.index() * 4)) & 0xF)
    }

    #[inline]
    pub fn unpack(self) -> RoutingRow {
        RoutingRow(Category::ALL.map(|c| self.get(c)))
    }
}

#[inline]
fn encode_nibble(category: Category) -> u16 {
    if category.is_valid() {
        category.index() as u16
    } else {
        NIBBLE_INVALID
    }
}

#[inline]
fn decode_nibble(nibble: u16) -> Category {
    Category::from_index(nibble as usize)
}

impl From<RoutingRow> for PackedRoutingRow {
    fn from(row: RoutingRow) -> Self {
        let bits = row
            .0
            .iter()
            .enumerate()
            .fold(0u16, |acc, (i, c)| acc | (encode_nibble(*c) << (i * 4)));
        PackedRoutingRow(bits)
    }
}

impl From<PackedRoutingRow> for RoutingRow {
    fn from(packed: PackedRoutingRow) -> Self {
        packed.unpack()
    }
}

/// Left fold of a branch's children in row space.
///
/// Starts as the identity. The first child seeds the accumulator unchanged,
/// every following child is combined using its own operation.
#[derive(Debug, Clone, Copy)]
pub struct RowFold {
    family: TableFamily,
    acc: Option<RoutingRow>,
}

impl RowFold {
    pub fn new(family: TableFamily) -> Self {
        Self { family, acc: None }
    }

    pub fn push(&mut self, op: OperationKind, child: &RoutingRow) {
        self.push_with(self.family, op, child);
    }

    /// Push a child using an explicit table family for this step
    pub fn push_with(&mut self, family: TableFamily, op: OperationKind, child: &RoutingRow) {
        self.acc = Some(match self.acc {
            None => *child,
            Some(acc) => RoutingRow::combine(family, op, &acc, child),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.acc.is_none()
    }

    pub fn current(&self) -> RoutingRow {
        self.acc.unwrap_or(RoutingRow::IDENTITY)
    }

    pub fn finish(self) -> RoutingRow {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Category::*;

    fn all_rows() -> Vec<RoutingRow> {
        let mut rows = Vec::with_capacity(256);
        for a in Category::ALL {
            for b in Category::ALL {
                for c in Category::ALL {
                    for d in Category::ALL {
                        rows.push(RoutingRow::new(a, b, c, d));
                    }
                }
            }
        }
        rows
    }

    #[test]
    fn test_composition_closure() {
        for row in all_rows() {
            for family in TableFamily::ALL {
                for op in OperationKind::ALL {
                    for left in Category::ALL {
                        let composed = RoutingRow::compose(family, op, left, &row);
                        assert!(composed.is_closed(), "{} {} {} {}", family, op, left, row);
                    }
                }
            }
        }
    }

    #[test]
    fn test_compose_with_identity_reads_table_row() {
        let row = RoutingRow::compose(
            TableFamily::Regular,
            OperationKind::Subtractive,
            Inside,
            &RoutingRow::IDENTITY,
        );
        assert_eq!(row, RoutingRow::new(Outside, ReverseAligned, Aligned, Inside));
    }

    #[test]
    fn test_combine_with_uniform_left_matches_compose() {
        let right = RoutingRow::new(Aligned, Outside, Inside, ReverseAligned);
        for op in OperationKind::ALL {
            for left in Category::ALL {
                assert_eq!(
                    RoutingRow::combine(TableFamily::Regular, op, &RoutingRow::uniform(left), &right),
                    RoutingRow::compose(TableFamily::Regular, op, left, &right)
                );
            }
        }
    }

    #[test]
    fn test_identity_fold() {
        let child = RoutingRow::new(ReverseAligned, Inside, Outside, Aligned);
        for op in OperationKind::ALL {
            let mut fold = RowFold::new(TableFamily::Regular);
            fold.push(op, &child);
            assert_eq!(fold.finish(), child);
        }
        assert_eq!(RowFold::new(TableFamily::Regular).finish(), RoutingRow::IDENTITY);
    }

    #[test]
    fn test_fold_order_sensitivity() {
        let a = RoutingRow::new(Inside, Inside, Outside, Outside);
        let b = RoutingRow::new(Inside, Outside, Inside, Outside);
        let c = RoutingRow::new(Outside, Outside, Outside, Inside);

        let mut forward = RowFold::new(TableFamily::Regular);
        forward.push(OperationKind::Additive, &a);
        forward.push(OperationKind::Subtractive, &b);
        forward.push(OperationKind::Additive, &c);

        let mut reversed = RowFold::new(TableFamily::Regular);
        reversed.push(OperationKind::Additive, &c);
        reversed.push(OperationKind::Subtractive, &b);
        reversed.push(OperationKind::Additive, &a);

        // (a - b) + c = {O,I,O,I}; (c - b) + a = {I,I,O,I}
        assert_eq!(forward.finish(), RoutingRow::new(Outside, Inside, Outside, Inside));
        assert_eq!(reversed.finish(), RoutingRow::new(Inside, Inside, Outside, Inside));
        assert_ne!(forward.finish(), reversed.finish());
    }

    #[test]
    fn test_uniform_and_identity() {
        assert!(RoutingRow::uniform(Outside).is_uniform());
        assert!(!RoutingRow::IDENTITY.is_uniform());
        assert!(RoutingRow::IDENTITY.is_identity());
        assert_eq!(RoutingRow::identity_seeded(Aligned), RoutingRow::uniform(Aligned));
        assert_eq!(RoutingRow::identity_seeded(Invalid), RoutingRow::IDENTITY);
    }

    #[test]
    fn test_then_chains_functions() {
        let inner = RoutingRow::new(Outside, Aligned, Aligned, Inside);
        let outer = RoutingRow::new(Aligned, Outside, Inside, ReverseAligned);
        let chained = inner.then(&outer);
        for c in Category::ALL {
            assert_eq!(chained.get(c), outer.get(inner.get(c)));
        }
    }

    #[test]
    fn test_packing_round_trip() {
        for row in all_rows() {
            let packed = row.pack();
            assert_eq!(packed.unpack(), row);
            for c in Category::ALL {
                assert_eq!(packed.get(c), row.get(c));
            }
        }
        let invalid = RoutingRow::uniform(Invalid);
        assert_eq!(invalid.pack().bits(), 0xFFFF);
        assert_eq!(invalid.pack().unpack(), invalid);
    }

    #[test]
    fn test_display() {
        assert_eq!(RoutingRow::IDENTITY.to_string(), "{I,A,R,O}");
    }
}

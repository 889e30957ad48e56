// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Boolean operation kinds and their category transition tables
//!
//! Tables are addressed `table[operator][left][right]`. The contents are a
//! fixed data contract; changing a single entry changes which fragments
//! survive a CSG evaluation.

use super::category::{Category, CATEGORY_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of table slots per family (three operators plus a reserved slot)
pub const OPERATION_SLOTS: usize = 4;

/// 4x4 transition table, rows = left category, columns = right category
pub type OperationTable = [[Category; CATEGORY_COUNT]; CATEGORY_COUNT];

/// How a node combines with the accumulated result of its preceding siblings
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Union
    #[default]
    Additive = 0,
    /// Difference
    Subtractive = 1,
    /// Intersection
    Intersecting = 2,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [
        OperationKind::Additive,
        OperationKind::Subtractive,
        OperationKind::Intersecting,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn symbol(self) -> char {
        match self {
            OperationKind::Additive => '+',
            OperationKind::Subtractive => '-',
            OperationKind::Intersecting => '&',
        }
    }

    pub fn parse(text: &str) -> Option<OperationKind> {
        match text.trim().to_lowercase().as_str() {
            "additive" | "add" | "union" | "+" => Some(OperationKind::Additive),
            "subtractive" | "subtract" | "difference" | "-" => Some(OperationKind::Subtractive),
            "intersecting" | "intersect" | "intersection" | "&" => {
                Some(OperationKind::Intersecting)
            }
            _ => None,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::Additive => "Additive",
            OperationKind::Subtractive => "Subtractive",
            OperationKind::Intersecting => "Intersecting",
        };
        f.write_str(name)
    }
}

/// Selects which set of operation tables a fold uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFamily {
    /// Combining two distinct subtrees
    #[default]
    Regular,
    /// Collapsing coincident surfaces that come from the same brush
    OverlapRemoval,
}

impl TableFamily {
    pub const ALL: [TableFamily; 2] = [TableFamily::Regular, TableFamily::OverlapRemoval];

    /// All four table slots of this family
    #[inline]
    pub fn tables(self) -> &'static [OperationTable; OPERATION_SLOTS] {
        match self {
            TableFamily::Regular => &REGULAR_OPERATION_TABLES,
            TableFamily::OverlapRemoval => &OVERLAP_REMOVAL_OPERATION_TABLES,
        }
    }

    /// Table for one operator
    #[inline]
    pub fn table(self, op: OperationKind) -> &'static OperationTable {
        &self.tables()[op.index()]
    }

    /// The reserved fourth slot, kept so operator ordinals line up
    pub fn reserved(self) -> &'static OperationTable {
        &self.tables()[OPERATION_SLOTS - 1]
    }

    /// `table[op][left][right]`; an `Invalid` operand yields `Invalid`
    #[inline]
    pub fn apply(self, op: OperationKind, left: Category, right: Category) -> Category {
        if !left.is_valid() || !right.is_valid() {
            return Category::Invalid;
        }
        self.table(op)[left.index()][right.index()]
    }
}

impl fmt::Display for TableFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableFamily::Regular => f.write_str("regular"),
            TableFamily::OverlapRemoval => f.write_str("overlap-removal"),
        }
    }
}

const I: Category = Category::Inside;
const A: Category = Category::Aligned;
const R: Category = Category::ReverseAligned;
const O: Category = Category::Outside;
const X: Category = Category::Invalid;

const RESERVED_TABLE: OperationTable = [[X, X, X, X], [X, X, X, X], [X, X, X, X], [X, X, X, X]];

/// Tables used when combining two distinct subtrees
pub static REGULAR_OPERATION_TABLES: [OperationTable; OPERATION_SLOTS] = [
    // Additive
    [
        [I, I, I, I], // Inside
        [I, A, I, A], // Aligned
        [I, I, R, R], // ReverseAligned
        [I, A, R, O], // Outside
    ],
    // Subtractive
    [
        [O, R, A, I],
        [O, O, A, A],
        [O, R, O, R],
        [O, O, O, O],
    ],
    // Intersecting
    [
        [I, A, R, O],
        [A, A, O, O],
        [R, O, R, O],
        [O, O, O, O],
    ],
    RESERVED_TABLE,
];

/// Tables used when a coincident surface of the same brush must collapse
pub static OVERLAP_REMOVAL_OPERATION_TABLES: [OperationTable; OPERATION_SLOTS] = [
    // Additive
    [
        [I, I, I, I],
        [I, I, I, A],
        [I, I, I, R],
        [I, I, I, O],
    ],
    // Subtractive
    [
        [O, O, O, I],
        [O, O, O, A],
        [O, O, O, R],
        [O, O, O, O],
    ],
    // Intersecting
    [
        [I, O, O, O],
        [A, O, O, O],
        [R, O, O, O],
        [O, O, O, O],
    ],
    RESERVED_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tables_are_total() {
        for family in TableFamily::ALL {
            for op in OperationKind::ALL {
                for left in Category::ALL {
                    for right in Category::ALL {
                        let out = family.apply(op, left, right);
                        assert!(
                            out.is_valid(),
                            "{} {} [{}][{}] produced Invalid",
                            family,
                            op,
                            left,
                            right
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_reserved_slot_is_invalid() {
        for family in TableFamily::ALL {
            for row in family.reserved() {
                assert!(row.iter().all(|c| *c == Category::Invalid));
            }
        }
    }

    #[test]
    fn test_additive_outside_row_is_identity() {
        let row = TableFamily::Regular.table(OperationKind::Additive)[Category::Outside.index()];
        assert_eq!(row, Category::ALL);
    }

    #[test]
    fn test_invalid_operand() {
        let out = TableFamily::Regular.apply(
            OperationKind::Additive,
            Category::Invalid,
            Category::Inside,
        );
        assert_eq!(out, Category::Invalid);
    }

    #[test]
    fn test_spot_entries() {
        use Category::*;
        let regular = TableFamily::Regular;
        assert_eq!(regular.apply(OperationKind::Subtractive, Inside, Aligned), ReverseAligned);
        assert_eq!(regular.apply(OperationKind::Intersecting, Aligned, ReverseAligned), Outside);
        let overlap = TableFamily::OverlapRemoval;
        assert_eq!(overlap.apply(OperationKind::Additive, Aligned, Aligned), Inside);
        assert_eq!(overlap.apply(OperationKind::Intersecting, ReverseAligned, Inside), ReverseAligned);
    }

    #[test]
    fn test_parse_operation() {
        assert_eq!(OperationKind::parse("union"), Some(OperationKind::Additive));
        assert_eq!(OperationKind::parse("-"), Some(OperationKind::Subtractive));
        assert_eq!(OperationKind::parse("Intersect"), Some(OperationKind::Intersecting));
        assert_eq!(OperationKind::parse("xor"), None);
    }
}

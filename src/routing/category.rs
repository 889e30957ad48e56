// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Fragment categories

use crate::error::{CsgError, CsgResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of valid categories
pub const CATEGORY_COUNT: usize = 4;

/// Classification of a surface fragment relative to a solid or surface
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Fragment lies inside the solid
    Inside = 0,
    /// Fragment lies on the surface, facing along its normal
    Aligned = 1,
    /// Fragment lies on the surface, facing against its normal
    ReverseAligned = 2,
    /// Fragment lies outside the solid
    Outside = 3,
    /// Out-of-band marker for table slots that were never built
    Invalid = 255,
}

impl Category {
    /// The valid categories in ordinal order
    pub const ALL: [Category; CATEGORY_COUNT] = [
        Category::Inside,
        Category::Aligned,
        Category::ReverseAligned,
        Category::Outside,
    ];

    /// Ordinal used as table index (`Invalid` maps to 255)
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Category for an ordinal, `Invalid` for anything outside 0..=3
    #[inline]
    pub const fn from_index(index: usize) -> Category {
        match index {
            0 => Category::Inside,
            1 => Category::Aligned,
            2 => Category::ReverseAligned,
            3 => Category::Outside,
            _ => Category::Invalid,
        }
    }

    /// Validate an ordinal coming from a classification provider.
    ///
    /// Only 0..=3 are accepted; the `Invalid` sentinel is not a classification.
    pub fn from_ordinal(ordinal: u8) -> CsgResult<Category> {
        match Category::from_index(ordinal as usize) {
            Category::Invalid => Err(CsgError::InvalidCategory(ordinal)),
            category => Ok(category),
        }
    }

    #[inline]
    pub const fn is_valid(self) -> bool {
        !matches!(self, Category::Invalid)
    }

    /// Whether the fragment lies on the dividing surface
    pub const fn is_on_surface(self) -> bool {
        matches!(self, Category::Aligned | Category::ReverseAligned)
    }

    /// Single-letter symbol used in table dumps
    pub const fn symbol(self) -> char {
        match self {
            Category::Inside => 'I',
            Category::Aligned => 'A',
            Category::ReverseAligned => 'R',
            Category::Outside => 'O',
            Category::Invalid => '-',
        }
    }

    /// Parse a symbol or full name, case-insensitive
    pub fn parse(text: &str) -> Option<Category> {
        match text.trim().to_lowercase().as_str() {
            "i" | "inside" => Some(Category::Inside),
            "a" | "aligned" => Some(Category::Aligned),
            "r" | "reverse" | "reversealigned" | "reverse_aligned" => {
                Some(Category::ReverseAligned)
            }
            "o" | "outside" => Some(Category::Outside),
            _ => None,
        }
    }

    /// How a consumer should emit a fragment with this final category
    pub const fn emission(self) -> Emission {
        match self {
            Category::Aligned => Emission::Emit,
            Category::ReverseAligned => Emission::EmitFlipped,
            _ => Emission::Discard,
        }
    }
}

impl TryFrom<u8> for Category {
    type Error = CsgError;

    /// Decode a stored ordinal. Unlike [`Category::from_ordinal`] the
    /// `Invalid` sentinel round-trips.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value == Category::Invalid as u8 {
            return Ok(Category::Invalid);
        }
        Category::from_ordinal(value)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Inside => "Inside",
            Category::Aligned => "Aligned",
            Category::ReverseAligned => "ReverseAligned",
            Category::Outside => "Outside",
            Category::Invalid => "Invalid",
        };
        f.write_str(name)
    }
}

/// Polygon emission decision for a fully routed fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Emission {
    Discard,
    /// Emit with the fragment's own winding
    Emit,
    /// Emit with reversed winding
    EmitFlipped,
}

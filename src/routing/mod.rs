// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Category routing algebra
//!
//! Categories, operation tables, routing rows and the flattened tables the
//! tree evaluator builds from them.

mod category;
mod operation;
mod row;
mod table;

pub use category::{Category, Emission, CATEGORY_COUNT};
pub use operation::{
    OperationKind, OperationTable, TableFamily, OPERATION_SLOTS,
    OVERLAP_REMOVAL_OPERATION_TABLES, REGULAR_OPERATION_TABLES,
};
pub use row::{PackedRoutingRow, RoutingRow, RowFold};
pub use table::{trim_noop_rows, RoutingLookup, RoutingTable};

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Tree evaluation
//!
//! Builds routing tables from tree snapshots and categorizes fragments
//! through them.

mod evaluator;
mod incremental_evaluator;
mod parallel_evaluator;
mod provider;
mod routing;
mod selector;

pub use evaluator::{node_rows, CancelFlag, TreeEvaluator};
pub use incremental_evaluator::{CacheStats, IncrementalEvaluator, RoutingCache};
pub use parallel_evaluator::ParallelEvaluator;
pub use provider::{CategoryProvider, FragmentCategories};
pub use routing::{RouteHop, TreeRouting};
pub use selector::{effective_family, needs_dedicated, RegularOnly, SameMeshOverlap, TableFamilySelector};

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG tree model
//!
//! Trees of branches and brushes, stored behind generation-checked handles

mod handle;
mod hierarchy;
mod node;
mod snapshot;

pub use handle::NodeHandle;
pub use hierarchy::CsgHierarchy;
pub use node::{BrushMeshId, CsgNode, NodeKind, NodeSource, NodeVariant};
pub use snapshot::{Children, SnapshotNode, TreeSnapshot};

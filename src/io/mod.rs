// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! I/O module - tree descriptions and their dependency graph

mod dependency_graph;
mod description;

pub use dependency_graph::{DependencyGraph, NodeId};
pub use description::{BuiltTrees, DescriptionError, NodeDescription, TreeDescription};

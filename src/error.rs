// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Error types for tree validation and routing

use crate::csg::NodeHandle;
use thiserror::Error;

/// Errors raised by the CSG tree model and the routing evaluator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsgError {
    /// A node is reachable from itself
    #[error("cycle detected at node {node}")]
    Cycle { node: NodeHandle },

    /// The same child is listed twice under one parent
    #[error("node {child} is listed more than once under {parent}")]
    DuplicateChild {
        parent: NodeHandle,
        child: NodeHandle,
    },

    /// A node is attached to more than one parent
    #[error("node {child} already belongs to {existing}, cannot attach to {parent}")]
    MultipleParents {
        child: NodeHandle,
        existing: NodeHandle,
        parent: NodeHandle,
    },

    /// The child cannot be placed under the given parent
    #[error("node {child} cannot be a child of {parent}")]
    InvalidChild {
        parent: NodeHandle,
        child: NodeHandle,
    },

    #[error("node {0} is not a tree")]
    NotATree(NodeHandle),

    #[error("node {0} cannot hold children")]
    NotABranch(NodeHandle),

    #[error("node {0} is not a brush")]
    NotABrush(NodeHandle),

    #[error("node {0} has no operation")]
    NoOperation(NodeHandle),

    /// Handle refers to a destroyed or recycled node
    #[error("stale node handle {0}")]
    StaleHandle(NodeHandle),

    /// Category ordinal outside 0..=3
    #[error("invalid category ordinal {0}")]
    InvalidCategory(u8),

    #[error("tree depth exceeds limit of {limit}")]
    DepthExceeded { limit: usize },

    #[error("evaluation cancelled")]
    Cancelled,
}

/// Result alias for the routing core
pub type CsgResult<T> = Result<T, CsgError>;

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! CSG node definitions

use super::NodeHandle;
use crate::routing::OperationKind;
use nalgebra::{Matrix4, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a convex brush mesh owned by the geometry layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrushMeshId(pub u32);

impl fmt::Display for BrushMeshId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mesh:{}", self.0)
    }
}

/// Node variant without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeVariant {
    Tree,
    Branch,
    Brush,
}

/// Types of CSG nodes
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Root; children are folded in order, no operation of its own
    Tree { children: Vec<NodeHandle> },

    /// Internal node combining its children
    Branch {
        operation: OperationKind,
        children: Vec<NodeHandle>,
    },

    /// Leaf referencing a convex mesh. `None` contributes no geometry.
    Brush {
        operation: OperationKind,
        mesh: Option<BrushMeshId>,
        transform: Matrix4<f64>,
    },
}

impl NodeKind {
    pub fn variant(&self) -> NodeVariant {
        match self {
            NodeKind::Tree { .. } => NodeVariant::Tree,
            NodeKind::Branch { .. } => NodeVariant::Branch,
            NodeKind::Brush { .. } => NodeVariant::Brush,
        }
    }

    /// Ordered children; brushes have none
    pub fn children(&self) -> &[NodeHandle] {
        match self {
            NodeKind::Tree { children } | NodeKind::Branch { children, .. } => children,
            NodeKind::Brush { .. } => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<NodeHandle>> {
        match self {
            NodeKind::Tree { children } | NodeKind::Branch { children, .. } => Some(children),
            NodeKind::Brush { .. } => None,
        }
    }

    pub fn operation(&self) -> Option<OperationKind> {
        match self {
            NodeKind::Tree { .. } => None,
            NodeKind::Branch { operation, .. } | NodeKind::Brush { operation, .. } => {
                Some(*operation)
            }
        }
    }

    pub fn mesh(&self) -> Option<BrushMeshId> {
        match self {
            NodeKind::Brush { mesh, .. } => *mesh,
            _ => None,
        }
    }

    pub fn transform(&self) -> Option<&Matrix4<f64>> {
        match self {
            NodeKind::Brush { transform, .. } => Some(transform),
            _ => None,
        }
    }

    pub fn can_hold_children(&self) -> bool {
        !matches!(self, NodeKind::Brush { .. })
    }
}

/// A node as stored by a node store
#[derive(Debug, Clone, PartialEq)]
pub struct CsgNode {
    pub kind: NodeKind,
    pub parent: Option<NodeHandle>,
    /// Set when the node or anything below it changed since the last evaluation
    pub dirty: bool,
}

impl CsgNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            dirty: true,
        }
    }

    pub fn tree() -> Self {
        Self::new(NodeKind::Tree {
            children: Vec::new(),
        })
    }

    pub fn branch(operation: OperationKind) -> Self {
        Self::new(NodeKind::Branch {
            operation,
            children: Vec::new(),
        })
    }

    pub fn brush(operation: OperationKind, mesh: Option<BrushMeshId>, transform: Matrix4<f64>) -> Self {
        Self::new(NodeKind::Brush {
            operation,
            mesh,
            transform,
        })
    }

    /// Brush placed at `translation`
    pub fn brush_at(operation: OperationKind, mesh: BrushMeshId, translation: Vector3<f64>) -> Self {
        Self::brush(operation, Some(mesh), Matrix4::new_translation(&translation))
    }

    pub fn variant(&self) -> NodeVariant {
        self.kind.variant()
    }

    pub fn children(&self) -> &[NodeHandle] {
        self.kind.children()
    }
}

/// Read access to a node store.
///
/// Implementations must never resolve a stale handle to a different node.
pub trait NodeSource {
    fn node(&self, handle: NodeHandle) -> Option<&CsgNode>;

    fn is_valid(&self, handle: NodeHandle) -> bool {
        self.node(handle).is_some()
    }
}

impl<S: NodeSource + ?Sized> NodeSource for &S {
    fn node(&self, handle: NodeHandle) -> Option<&CsgNode> {
        (**self).node(handle)
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Polyframe CSG routing engine
//!
//! Decides, for every surface fragment of a brush, whether it lies inside,
//! outside or on the boundary of the solid described by a tree of boolean
//! operations. Trees are flattened into routing tables once and queried per
//! fragment.

pub mod config;
pub mod csg;
pub mod error;
pub mod eval;
pub mod io;
pub mod kernel;
pub mod logging;
pub mod routing;

pub use config::{OverlapPolicy, RoutingConfig};
pub use csg::{BrushMeshId, CsgHierarchy, CsgNode, NodeHandle, NodeKind, NodeSource, TreeSnapshot};
pub use error::{CsgError, CsgResult};
pub use eval::{
    CacheStats, CategoryProvider, FragmentCategories, IncrementalEvaluator, ParallelEvaluator,
    RouteHop, TreeEvaluator, TreeRouting,
};
pub use io::{BuiltTrees, TreeDescription};
pub use kernel::{CsgKernel, UpdateReport};
pub use routing::{Category, OperationKind, RoutingRow, RoutingTable, TableFamily};

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Build a description into a fresh kernel and evaluate every tree
pub fn load_description(description: &TreeDescription, config: RoutingConfig) -> Result<(CsgKernel, BuiltTrees)> {
    let mut kernel = CsgKernel::with_config(config);
    let built = description.build(kernel.hierarchy_mut())?;
    let report = kernel.update();
    if let Some((tree, err)) = report.failed.first() {
        let id = built.id_of(*tree).unwrap_or("?");
        bail!("Failed to evaluate tree '{}': {}", id, err);
    }
    Ok((kernel, built))
}

/// Load a `.json` or `.toml` description file and evaluate every tree
pub fn load_description_file(path: impl AsRef<Path>, config: RoutingConfig) -> Result<(CsgKernel, BuiltTrees)> {
    let path = path.as_ref();
    let description = TreeDescription::load(path)?;
    load_description(&description, config).with_context(|| format!("Failed to route {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_description() {
        let description = TreeDescription::from_json_str(
            r#"{
                "name": "pair",
                "nodes": [
                    { "id": "root", "kind": "tree", "children": ["a", "b"] },
                    { "id": "a", "kind": "brush", "mesh": 1 },
                    { "id": "b", "kind": "brush", "operation": "subtractive", "mesh": 2 }
                ]
            }"#,
        )
        .unwrap();
        let (kernel, built) = load_description(&description, RoutingConfig::default()).unwrap();
        let tree = built.tree("root").unwrap();
        let a = built.handle("a").unwrap();
        let b = built.handle("b").unwrap();

        let fragment = FragmentCategories::new(b).with(a, Category::Inside);
        assert_eq!(kernel.categorize(tree, b, &fragment).unwrap(), Category::ReverseAligned);
    }
}

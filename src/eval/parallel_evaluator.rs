// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Parallel tree evaluator using rayon

use super::evaluator::TreeEvaluator;
use super::routing::TreeRouting;
use crate::config::RoutingConfig;
use crate::csg::{NodeHandle, NodeSource};
use crate::error::CsgResult;
use rayon::prelude::*;

/// Evaluates independent trees concurrently
pub struct ParallelEvaluator;

impl ParallelEvaluator {
    /// Evaluate every tree in `trees` with a fresh evaluator for `config`
    pub fn evaluate_trees<S>(
        source: &S,
        trees: &[NodeHandle],
        config: &RoutingConfig,
    ) -> Vec<(NodeHandle, CsgResult<TreeRouting>)>
    where
        S: NodeSource + Sync + ?Sized,
    {
        Self::evaluate_with(&TreeEvaluator::with_config(config.clone()), source, trees)
    }

    /// Evaluate every tree in `trees` with `evaluator`, preserving input order
    pub fn evaluate_with<S>(
        evaluator: &TreeEvaluator,
        source: &S,
        trees: &[NodeHandle],
    ) -> Vec<(NodeHandle, CsgResult<TreeRouting>)>
    where
        S: NodeSource + Sync + ?Sized,
    {
        trees
            .par_iter()
            .map(|tree| (*tree, evaluator.evaluate(source, *tree)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::{BrushMeshId, CsgHierarchy};
    use crate::routing::{Category, OperationKind};
    use nalgebra::Matrix4;

    #[test]
    fn test_parallel_matches_sequential() {
        let mut h = CsgHierarchy::new();
        let mut trees = Vec::new();
        for i in 0..8u32 {
            let tree = h.create_tree();
            for j in 0..4u32 {
                let op = OperationKind::ALL[((i + j) % 3) as usize];
                let brush = h.create_brush(op, Some(BrushMeshId(j % 2)), Matrix4::identity());
                h.add_child(tree, brush).unwrap();
            }
            trees.push(tree);
        }

        let config = RoutingConfig::default();
        let parallel = ParallelEvaluator::evaluate_trees(&h, &trees, &config);
        let sequential = TreeEvaluator::with_config(config);

        assert_eq!(parallel.len(), trees.len());
        for ((tree, result), expected_tree) in parallel.iter().zip(&trees) {
            assert_eq!(tree, expected_tree);
            let routing = result.as_ref().unwrap();
            let reference = sequential.evaluate(&h, *tree).unwrap();
            assert_eq!(routing.shared_table().as_ref(), reference.shared_table().as_ref());
            for brush in routing.brushes() {
                let fragment = |other: NodeHandle| {
                    if other == brush {
                        Category::Aligned
                    } else {
                        Category::Inside
                    }
                };
                assert_eq!(
                    routing.categorize(brush, &fragment).unwrap(),
                    reference.categorize(brush, &fragment).unwrap()
                );
                assert_eq!(routing.table_for(brush), reference.table_for(brush));
            }
        }
    }

    #[test]
    fn test_failures_are_reported_per_tree() {
        let mut h = CsgHierarchy::new();
        let tree = h.create_tree();
        let branch = h.create_branch(OperationKind::Additive);

        let results = ParallelEvaluator::evaluate_trees(&h, &[tree, branch], &RoutingConfig::default());
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Kernel API for incremental routing updates

use crate::config::RoutingConfig;
use crate::csg::{CsgHierarchy, NodeHandle};
use crate::error::CsgError;
use crate::eval::{CacheStats, CategoryProvider, IncrementalEvaluator, TreeEvaluator, TreeRouting};
use crate::routing::Category;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome of one [`CsgKernel::update`] pass
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Trees rebuilt successfully
    pub evaluated: Vec<NodeHandle>,
    /// Trees skipped because their structure is invalid
    pub failed: Vec<(NodeHandle, CsgError)>,
    /// Stale cache entries dropped
    pub dropped: usize,
    pub elapsed: Duration,
}

impl UpdateReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Main kernel: a node store plus cached routing of every tree
pub struct CsgKernel {
    hierarchy: CsgHierarchy,
    evaluator: IncrementalEvaluator,
    config: RoutingConfig,
}

impl CsgKernel {
    /// Create a new kernel with default configuration
    pub fn new() -> Self {
        Self::with_config(RoutingConfig::default())
    }

    pub fn with_config(config: RoutingConfig) -> Self {
        Self {
            hierarchy: CsgHierarchy::new(),
            evaluator: IncrementalEvaluator::with_evaluator(TreeEvaluator::with_config(config.clone())),
            config,
        }
    }

    /// Kernel over an existing hierarchy
    pub fn with_hierarchy(hierarchy: CsgHierarchy, config: RoutingConfig) -> Self {
        Self {
            hierarchy,
            ..Self::with_config(config)
        }
    }

    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    pub fn hierarchy(&self) -> &CsgHierarchy {
        &self.hierarchy
    }

    /// Mutable node store; edits mark the affected trees dirty
    pub fn hierarchy_mut(&mut self) -> &mut CsgHierarchy {
        &mut self.hierarchy
    }

    /// Rebuild every dirty tree.
    ///
    /// A tree that fails validation is reported and left dirty; the others
    /// are still rebuilt.
    pub fn update(&mut self) -> UpdateReport {
        let start = Instant::now();
        let dirty = self.hierarchy.dirty_trees();

        let results: Vec<_> = {
            let hierarchy = &self.hierarchy;
            let evaluator = &self.evaluator;
            dirty
                .par_iter()
                .map(|tree| (*tree, evaluator.evaluate(hierarchy, *tree)))
                .collect()
        };

        let mut report = UpdateReport::default();
        for (tree, result) in results {
            match result {
                Ok(_) => {
                    self.hierarchy.clear_dirty(tree);
                    report.evaluated.push(tree);
                }
                Err(err) => {
                    log::error!("skipping tree {}: {}", tree, err);
                    report.failed.push((tree, err));
                }
            }
        }
        report.dropped = self.evaluator.retain_live(&self.hierarchy);
        report.elapsed = start.elapsed();

        log::debug!(
            "update: {} trees rebuilt, {} failed in {:?}",
            report.evaluated.len(),
            report.failed.len(),
            report.elapsed
        );
        report
    }

    /// Current routing of `tree`, rebuilt if it changed
    pub fn routing(&self, tree: NodeHandle) -> Result<Arc<TreeRouting>> {
        self.evaluator
            .evaluate(&self.hierarchy, tree)
            .with_context(|| format!("Failed to evaluate tree {}", tree))
    }

    /// Final category of a fragment of `origin` in `tree`
    pub fn categorize<P: CategoryProvider + ?Sized>(
        &self,
        tree: NodeHandle,
        origin: NodeHandle,
        provider: &P,
    ) -> Result<Category> {
        let routing = self.routing(tree)?;
        routing
            .categorize(origin, provider)
            .with_context(|| format!("Failed to categorize fragment of {}", origin))
    }

    /// Drop the cached routing of `tree`
    pub fn invalidate(&self, tree: NodeHandle) {
        self.evaluator.invalidate(tree);
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        self.evaluator.cache_stats()
    }
}

impl Default for CsgKernel {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Incremental evaluator with cache invalidation

use super::evaluator::TreeEvaluator;
use super::routing::TreeRouting;
use crate::csg::{NodeHandle, NodeSource};
use crate::error::{CsgError, CsgResult};
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Thread-safe routing cache keyed by tree handle
pub type RoutingCache = Arc<DashMap<NodeHandle, Arc<TreeRouting>>>;

/// Evaluator reusing the routing of trees that have not changed
pub struct IncrementalEvaluator {
    evaluator: TreeEvaluator,
    cache: RoutingCache,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl IncrementalEvaluator {
    pub fn new() -> Self {
        Self::with_evaluator(TreeEvaluator::new())
    }

    pub fn with_evaluator(evaluator: TreeEvaluator) -> Self {
        Self {
            evaluator,
            cache: Arc::new(DashMap::new()),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn evaluator(&self) -> &TreeEvaluator {
        &self.evaluator
    }

    /// Routing for `tree`: cached when the tree is clean, rebuilt otherwise
    pub fn evaluate<S: NodeSource + ?Sized>(&self, source: &S, tree: NodeHandle) -> CsgResult<Arc<TreeRouting>> {
        let root = source.node(tree).ok_or(CsgError::StaleHandle(tree))?;

        if !root.dirty {
            if let Some(cached) = self.get_cached(tree) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        match self.evaluator.evaluate(source, tree) {
            Ok(routing) => {
                let routing = Arc::new(routing);
                self.cache.insert(tree, Arc::clone(&routing));
                Ok(routing)
            }
            Err(err) => {
                // A failed rebuild never leaves the previous routing behind
                self.cache.remove(&tree);
                Err(err)
            }
        }
    }

    /// Drop the cached routing of `tree`
    pub fn invalidate(&self, tree: NodeHandle) {
        self.cache.remove(&tree);
    }

    /// Get cached routing if available
    pub fn get_cached(&self, tree: NodeHandle) -> Option<Arc<TreeRouting>> {
        self.cache.get(&tree).map(|entry| Arc::clone(entry.value()))
    }

    /// Drop entries whose tree handle no longer resolves; returns how many
    pub fn retain_live<S: NodeSource + ?Sized>(&self, source: &S) -> usize {
        let before = self.cache.len();
        self.cache.retain(|tree, _| source.is_valid(*tree));
        let dropped = before - self.cache.len();
        if dropped > 0 {
            log::debug!("dropped {} stale routing cache entries", dropped);
        }
        dropped
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get cache statistics
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            cached_trees: self.cache.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for IncrementalEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub cached_trees: usize,
    pub hits: usize,
    pub misses: usize,
}

impl CacheStats {
    /// Percentage of evaluations served from the cache
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f32 / total as f32) * 100.0
        }
    }
}

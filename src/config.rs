// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Routing configuration

use crate::eval::{RegularOnly, SameMeshOverlap, TableFamilySelector};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default configuration file looked up by [`RoutingConfig::load`]
pub const CONFIG_FILE: &str = "csg-routing.toml";

/// How coincident surfaces of duplicated brushes are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// A later brush with the same mesh as the origin uses overlap removal
    #[default]
    SameMesh,
    /// Regular tables only
    Disabled,
}

impl OverlapPolicy {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim().to_ascii_lowercase().as_str() {
            "same_mesh" | "same-mesh" | "samemesh" => Some(OverlapPolicy::SameMesh),
            "disabled" | "none" | "off" => Some(OverlapPolicy::Disabled),
            _ => None,
        }
    }
}

/// Tree evaluation settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Brush count from which per-origin tables are built in parallel
    pub parallel_threshold: usize,
    pub overlap_policy: OverlapPolicy,
    /// Drop trailing rows that equal the lookup fallback
    pub compact_rows: bool,
    /// Deepest node level accepted by snapshot capture
    pub max_depth: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 64,
            overlap_policy: OverlapPolicy::SameMesh,
            compact_rows: true,
            max_depth: 256,
        }
    }
}

impl RoutingConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: RoutingConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load `csg-routing.toml` if present, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = if PathBuf::from(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `POLYFRAME_CSG_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(threshold) = std::env::var("POLYFRAME_CSG_PARALLEL_THRESHOLD") {
            self.parallel_threshold = threshold
                .trim()
                .parse()
                .with_context(|| format!("Invalid POLYFRAME_CSG_PARALLEL_THRESHOLD: {}", threshold))?;
        }

        if let Ok(policy) = std::env::var("POLYFRAME_CSG_OVERLAP_POLICY") {
            self.overlap_policy = OverlapPolicy::parse(&policy)
                .with_context(|| format!("Invalid POLYFRAME_CSG_OVERLAP_POLICY: {}", policy))?;
        }

        if let Ok(depth) = std::env::var("POLYFRAME_CSG_MAX_DEPTH") {
            self.max_depth = depth
                .trim()
                .parse()
                .with_context(|| format!("Invalid POLYFRAME_CSG_MAX_DEPTH: {}", depth))?;
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    /// Table family selector implementing the overlap policy
    pub fn selector(&self) -> Arc<dyn TableFamilySelector> {
        match self.overlap_policy {
            OverlapPolicy::SameMesh => Arc::new(SameMeshOverlap),
            OverlapPolicy::Disabled => Arc::new(RegularOnly),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Logging initialization

/// Initialize logging with a default filter of `info`.
///
/// `RUST_LOG` overrides the filter.
pub fn init() {
    init_with_level("info");
}

/// Initialize logging with `level` as the default filter.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_with_level(level: &str) {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

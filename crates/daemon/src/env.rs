// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Config file path when `--config` is not given.
pub fn config_path() -> Option<PathBuf> {
    std::env::var("FLEET_CONFIG").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// State directory override. Logs go to `<state_dir>/logs` when set.
pub fn state_dir() -> Option<PathBuf> {
    std::env::var("FLEET_STATE_DIR").ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

/// Log filter directive: FLEET_LOG > RUST_LOG > "info"
pub fn log_filter() -> String {
    std::env::var("FLEET_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("RUST_LOG").ok().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "info".to_string())
}

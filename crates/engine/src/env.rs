// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for relay.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Environment passed to every submitted job.
pub const ENV_SINGLE_ITEM: &str = "RELAY_SINGLE_ITEM";
pub const ENV_SOURCE_PATH: &str = "RELAY_SOURCE_PATH";
pub const ENV_SOURCE_NAME: &str = "RELAY_SOURCE_NAME";

/// Resolve state directory: RELAY_STATE_DIR > XDG_STATE_HOME/relay > platform state dir > ~/.local/state/relay
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = non_empty("RELAY_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = non_empty("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("relay"));
    }
    if let Some(dir) = dirs::state_dir() {
        return Ok(dir.join("relay"));
    }
    let home = dirs::home_dir().ok_or(ConfigError::NoStateDir)?;
    Ok(home.join(".local/state/relay"))
}

/// Config file named by RELAY_CONFIG, if set
pub fn config_path() -> Option<PathBuf> {
    non_empty("RELAY_CONFIG").map(PathBuf::from)
}

/// Log filter override (takes the same syntax as RUST_LOG)
pub fn log_filter() -> Option<String> {
    non_empty("RELAY_LOG")
}

/// Runner backend override: `local` or `kubernetes`
pub fn runner_kind() -> Option<String> {
    non_empty("RELAY_RUNNER").map(|s| s.to_ascii_lowercase())
}

/// Root of the watched directory tree override
pub fn source_root() -> Option<PathBuf> {
    non_empty("RELAY_SOURCE_ROOT").map(PathBuf::from)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

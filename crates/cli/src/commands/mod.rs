// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI command implementations

pub mod cursor;
pub mod job;
pub mod runner;
pub mod sync;
pub mod tracking;

use std::time::Duration;

use anyhow::Result;

pub(crate) fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) =
        s.split_once('=').ok_or_else(|| format!("invalid input format '{}': must be key=value", s))?;
    if key.is_empty() {
        return Err(format!("invalid input format '{}': empty key", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse a human-readable duration string (e.g. "5m", "30s", "1h30m", "7d")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let mut total_secs: u64 = 0;
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
            continue;
        }
        let n: u64 = current_num.parse().map_err(|_| anyhow::anyhow!("invalid duration: {}", s))?;
        current_num.clear();
        let unit = match c {
            'd' => 86_400,
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => anyhow::bail!("unknown duration unit '{}' in: {}", c, s),
        };
        total_secs = n
            .checked_mul(unit)
            .and_then(|secs| total_secs.checked_add(secs))
            .ok_or_else(|| anyhow::anyhow!("duration too large: {}", s))?;
    }
    // Bare number → seconds
    if !current_num.is_empty() {
        let n: u64 = current_num.parse().map_err(|_| anyhow::anyhow!("invalid duration: {}", s))?;
        total_secs =
            total_secs.checked_add(n).ok_or_else(|| anyhow::anyhow!("duration too large: {}", s))?;
    }
    if total_secs == 0 {
        anyhow::bail!("duration must be > 0: {}", s);
    }
    Ok(Duration::from_secs(total_secs))
}

/// clap adapter for [`parse_duration`]
pub(crate) fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).map_err(|e| e.to_string())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

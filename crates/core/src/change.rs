// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Items reported by a change feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry from a change-feed diff. Only persisted as `file_info` in the
/// processed-job ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedEntry {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ChangedEntry {
    /// Lowercased extension including the leading dot, if the name has one.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some(format!(".{}", ext.to_ascii_lowercase()))
    }

    /// True when the entry's path lies under `prefix` (path-segment aware).
    pub fn is_under(&self, prefix: &str) -> bool {
        let prefix = prefix.trim_end_matches('/');
        if prefix.is_empty() {
            return true;
        }
        let path = self.path.as_str();
        match (path.get(..prefix.len()), path.get(prefix.len()..)) {
            (Some(head), Some(rest)) => {
                head.eq_ignore_ascii_case(prefix) && rest.len() > 1 && rest.starts_with('/')
            }
            _ => false,
        }
    }
}

crate::builder! {
    pub struct ChangedEntryBuilder => ChangedEntry {
        into {
            name: String = "a.mp3",
            path: String = "/transcripts/raw/a.mp3",
        }
        set {
            size: u64 = 1024,
            is_deleted: bool = false,
        }
        option {
            modified_at: DateTime<Utc> = None,
        }
    }
}

/// The item a job is submitted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub path: String,
    pub name: String,
}

impl SourceRef {
    pub fn new(path: impl Into<String>, name: impl Into<String>) -> Self {
        Self { path: path.into(), name: name.into() }
    }

    /// Derive the name from the last path segment.
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self { path, name }
    }
}

impl From<&ChangedEntry> for SourceRef {
    fn from(entry: &ChangedEntry) -> Self {
        Self::new(entry.path.clone(), entry.name.clone())
    }
}

#[cfg(test)]
#[path = "change_tests.rs"]
mod tests;

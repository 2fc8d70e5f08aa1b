// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{ChangedEntry, JobId, JobState, JobStatus};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for change-feed and job types.
pub mod strategies {
    use crate::{ChangedEntry, JobState};
    use proptest::prelude::*;

    pub fn arb_job_state() -> impl Strategy<Value = JobState> {
        prop::sample::select(JobState::ALL.to_vec())
    }

    /// Media-ish file names with a mix of supported and unsupported extensions.
    pub fn arb_file_name() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9 _-]{0,12}", prop::sample::select(vec!["mp3", "WAV", "m4a", "txt", "pdf"]))
            .prop_map(|(stem, ext)| format!("{}.{}", stem, ext))
    }

    pub fn arb_changed_entry(prefix: &'static str) -> impl Strategy<Value = ChangedEntry> {
        (arb_file_name(), any::<u32>(), any::<bool>()).prop_map(move |(name, size, is_deleted)| {
            ChangedEntry {
                path: format!("{}/{}", prefix, name),
                name,
                size: u64::from(size),
                modified_at: None,
                is_deleted,
            }
        })
    }
}

// ── Factory functions ─────────────────────────────────────────────────────

/// A live file entry under `folder`.
pub fn entry(folder: &str, name: &str) -> ChangedEntry {
    ChangedEntry::builder().name(name).path(format!("{}/{}", folder, name)).build()
}

/// A deletion marker under `folder`.
pub fn deleted_entry(folder: &str, name: &str) -> ChangedEntry {
    ChangedEntry::builder().name(name).path(format!("{}/{}", folder, name)).is_deleted(true).build()
}

pub fn status(id: &str, state: JobState) -> JobStatus {
    JobStatus::new(JobId::from(id), state)
}

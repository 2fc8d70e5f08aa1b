// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Processed-job ledger.
//!
//! One record per source item a job was triggered for, keyed by its dedup
//! key. Independent from the cursors: a cursor reset or a fallback full scan
//! sees the same items again, and the ledger keeps them from being
//! resubmitted.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use relay_adapters::Storage;
use relay_core::{ChangedEntry, Clock, JobId, SystemClock};
use relay_resilience::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::document::{check_key, Change, DocumentStore};
use crate::StateError;

pub const DEFAULT_TRACKING_PATH: &str = "processed_jobs.json";

fn default_success() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_info: Option<ChangedEntry>,
    pub processed_at: DateTime<Utc>,
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of the ledger document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackingInfo {
    pub processed_count: usize,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub reset_at: Option<DateTime<Utc>>,
    pub backend: String,
    pub path: String,
}

pub struct JobTracker<C: Clock = SystemClock> {
    store: DocumentStore<JobRecord, C>,
}

impl JobTracker<SystemClock> {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_clock(storage, SystemClock)
    }
}

impl<C: Clock> JobTracker<C> {
    pub fn with_clock(storage: Arc<dyn Storage>, clock: C) -> Self {
        tracing::info!(backend = %storage.name(), "job tracker ready");
        Self { store: DocumentStore::new(storage, DEFAULT_TRACKING_PATH, clock) }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.store = self.store.with_path(path);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.store = self.store.with_retry(retry);
        self
    }

    pub async fn is_processed(&self, key: &str) -> Result<bool, StateError> {
        Ok(self.store.read().await?.entries.contains_key(key))
    }

    /// Record that a job was triggered for `key`. An existing record is
    /// replaced.
    pub async fn mark_processed(
        &self,
        key: &str,
        job_id: Option<&JobId>,
        file_info: Option<&ChangedEntry>,
    ) -> Result<JobRecord, StateError> {
        check_key(key)?;
        let record = JobRecord {
            job_id: job_id.cloned(),
            file_info: file_info.cloned(),
            processed_at: self.store.now(),
            success: true,
            error: None,
        };
        let stored = record.clone();
        self.store
            .update(|doc| {
                doc.entries.insert(key.to_string(), stored);
                Ok(Change::Write(()))
            })
            .await?;
        tracing::debug!(key, job_id = ?record.job_id, "marked processed");
        Ok(record)
    }

    pub async fn get_record(&self, key: &str) -> Result<Option<JobRecord>, StateError> {
        Ok(self.store.read().await?.entries.get(key).cloned())
    }

    /// Records, most recently processed first.
    pub async fn list_processed(
        &self,
        limit: Option<usize>,
    ) -> Result<Vec<(String, JobRecord)>, StateError> {
        let doc = self.store.read().await?;
        let mut records: Vec<(String, JobRecord)> = doc.entries.into_iter().collect();
        records.sort_by(|(ka, a), (kb, b)| b.processed_at.cmp(&a.processed_at).then(ka.cmp(kb)));
        if let Some(limit) = limit {
            records.truncate(limit);
        }
        Ok(records)
    }

    pub async fn processed_count(&self) -> Result<usize, StateError> {
        Ok(self.store.read().await?.entries.len())
    }

    /// Forget `key` so its item can be processed again.
    pub async fn remove_record(&self, key: &str) -> Result<bool, StateError> {
        let removed = self
            .store
            .update(|doc| {
                Ok(match doc.entries.remove(key) {
                    Some(_) => Change::Write(true),
                    None => Change::Unchanged(false),
                })
            })
            .await?;
        if removed {
            tracing::info!(key, "processed record removed");
        }
        Ok(removed)
    }

    pub async fn reset_all(&self) -> Result<(), StateError> {
        self.store.reset().await
    }

    /// Remove records processed more than `days` days ago. Returns how many
    /// were removed; the document is only rewritten when that is non-zero.
    pub async fn cleanup_older_than(&self, days: u32) -> Result<usize, StateError> {
        let now = self.store.now();
        let cutoff = now
            .checked_sub_signed(chrono::Duration::days(i64::from(days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self
            .store
            .update(|doc| {
                let before = doc.entries.len();
                doc.entries.retain(|_, record| record.processed_at >= cutoff);
                let removed = before - doc.entries.len();
                if removed == 0 {
                    return Ok(Change::Unchanged(0));
                }
                doc.last_cleanup = Some(now);
                Ok(Change::Write(removed))
            })
            .await?;
        tracing::info!(removed, days, "processed records cleaned up");
        Ok(removed)
    }

    pub async fn info(&self) -> Result<TrackingInfo, StateError> {
        let doc = self.store.read().await?;
        Ok(TrackingInfo {
            processed_count: doc.entries.len(),
            last_updated: doc.last_updated,
            last_cleanup: doc.last_cleanup,
            reset_at: doc.reset_at,
            backend: self.store.backend().to_string(),
            path: self.store.path().to_string(),
        })
    }
}

#[cfg(test)]
#[path = "tracker_tests.rs"]
mod tests;

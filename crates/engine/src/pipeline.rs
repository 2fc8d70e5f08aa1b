// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change-notification pipeline.
//!
//! One call to [`WebhookPipeline::process_notification`] is one sync cycle:
//! resolve the cursor for the monitored folder, pull the changes since then,
//! filter and dedup them against the ledger, and submit a job per new file.
//!
//! Delivery is at-least-once. A file is marked processed only after its job
//! was accepted, so a crash between the two re-submits it on the next cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use relay_adapters::{ChangeBatch, ChangeSource, ChangeSourceError};
use relay_core::{ChangedEntry, Clock, DedupKey, JobId, SourceRef, SystemClock};
use relay_storage::{CursorManager, JobTracker, StateError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::orchestration::{OrchestrationService, RunnerInfo};

/// Hard failures of a sync cycle. Everything else is reported in the
/// [`SyncSummary`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    State(#[from] StateError),
}

/// Change notification as delivered by the webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub list_folder: Option<ListFolder>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFolder {
    #[serde(default)]
    pub accounts: Vec<String>,
}

impl Notification {
    /// A notification for a single account, as used by manual syncs.
    pub fn for_account(account: impl Into<String>) -> Self {
        Self { list_folder: Some(ListFolder { accounts: vec![account.into()] }) }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }

    pub fn accounts(&self) -> &[String] {
        self.list_folder.as_ref().map(|l| l.accounts.as_slice()).unwrap_or_default()
    }
}

/// How the changes of a cycle were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Notification carried no accounts
    Noop,
    /// First cycle for the folder; cursor stored, nothing processed
    Baseline,
    /// Changes since the stored cursor
    Incremental,
    /// Stored cursor expired; new baseline stored, nothing processed
    Rebaselined,
    /// Incremental listing failed; full listing used, cursor untouched
    Fallback,
}

relay_core::simple_display! {
    SyncMode {
        Noop => "noop",
        Baseline => "baseline",
        Incremental => "incremental",
        Rebaselined => "rebaselined",
        Fallback => "fallback",
    }
}

/// Outcome of one file's submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub file_name: String,
    pub path: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub success: bool,
    pub message: String,
    pub sync_mode: SyncMode,
    pub files_observed: usize,
    pub files_skipped_already_processed: usize,
    pub jobs_triggered: usize,
    #[serde(default)]
    pub job_results: Vec<JobResult>,
}

impl SyncSummary {
    fn empty(sync_mode: SyncMode, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            sync_mode,
            files_observed: 0,
            files_skipped_already_processed: 0,
            jobs_triggered: 0,
            job_results: Vec::new(),
        }
    }

    fn source_failure(sync_mode: SyncMode, error: &ChangeSourceError) -> Self {
        Self { success: false, ..Self::empty(sync_mode, format!("change source failed: {}", error)) }
    }

    fn invalid_payload(error: &serde_json::Error) -> Self {
        Self {
            success: false,
            ..Self::empty(SyncMode::Noop, format!("invalid notification payload: {}", error))
        }
    }
}

/// Reported by `processing_stats`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingStats {
    pub processed_count: usize,
    pub monitored_path: String,
    pub supported_formats: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
    pub runner: RunnerInfo,
}

enum Listing {
    Changes(SyncMode, Vec<ChangedEntry>),
    Done(SyncSummary),
}

pub struct WebhookPipeline<C: Clock = SystemClock> {
    source: Arc<dyn ChangeSource>,
    cursors: Arc<CursorManager<C>>,
    tracker: Arc<JobTracker<C>>,
    orchestration: Arc<OrchestrationService<C>>,
    monitored_path: String,
    supported_formats: BTreeSet<String>,
}

impl<C: Clock> WebhookPipeline<C> {
    /// `supported_formats` are extensions with the leading dot; matching is
    /// case-insensitive.
    pub fn new(
        source: Arc<dyn ChangeSource>,
        cursors: Arc<CursorManager<C>>,
        tracker: Arc<JobTracker<C>>,
        orchestration: Arc<OrchestrationService<C>>,
        monitored_path: impl Into<String>,
        supported_formats: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            source,
            cursors,
            tracker,
            orchestration,
            monitored_path: monitored_path.into(),
            supported_formats: supported_formats.into_iter().map(|f| f.to_ascii_lowercase()).collect(),
        }
    }

    pub fn monitored_path(&self) -> &str {
        &self.monitored_path
    }

    /// Parse a raw webhook body and run one cycle. A body that does not
    /// parse yields a failed no-op summary.
    pub async fn process_payload(&self, payload: &[u8]) -> Result<SyncSummary, PipelineError> {
        match Notification::parse(payload) {
            Ok(notification) => self.process_notification(&notification).await,
            Err(e) => {
                tracing::warn!(error = %e, "rejected notification payload");
                Ok(SyncSummary::invalid_payload(&e))
            }
        }
    }

    pub async fn process_notification(
        &self,
        notification: &Notification,
    ) -> Result<SyncSummary, PipelineError> {
        let accounts = notification.accounts();
        if accounts.is_empty() {
            tracing::info!("notification has no accounts, nothing to do");
            return Ok(SyncSummary::empty(SyncMode::Noop, "No accounts in notification"));
        }
        tracing::info!(accounts = accounts.len(), folder = %self.monitored_path, "processing notification");

        let (mode, entries) = match self.list_changes().await? {
            Listing::Changes(mode, entries) => (mode, entries),
            Listing::Done(summary) => return Ok(summary),
        };

        let candidates: Vec<ChangedEntry> = entries.into_iter().filter(|e| self.accepts(e)).collect();
        let observed = candidates.len();
        if candidates.is_empty() {
            tracing::info!(%mode, "no new changes");
            return Ok(SyncSummary::empty(mode, "No new changes found"));
        }

        let mut fresh = Vec::new();
        let mut skipped = 0;
        for entry in candidates {
            let key = DedupKey::for_path(&entry.path);
            if self.tracker.is_processed(key.as_str()).await? {
                tracing::debug!(path = %entry.path, "already processed");
                skipped += 1;
            } else {
                fresh.push((key, entry));
            }
        }

        let mut summary = SyncSummary {
            files_observed: observed,
            files_skipped_already_processed: skipped,
            ..SyncSummary::empty(mode, "All files already processed")
        };
        if fresh.is_empty() {
            return Ok(summary);
        }

        for (key, entry) in fresh {
            let result = match self.orchestration.submit_job(&SourceRef::from(&entry), BTreeMap::new()).await {
                Ok(job_id) => {
                    self.tracker.mark_processed(key.as_str(), Some(&job_id), Some(&entry)).await?;
                    JobResult {
                        file_name: entry.name,
                        path: entry.path,
                        success: true,
                        job_id: Some(job_id),
                        error: None,
                    }
                }
                Err(e) => {
                    tracing::error!(path = %entry.path, error = %e, "failed to trigger job");
                    JobResult {
                        file_name: entry.name,
                        path: entry.path,
                        success: false,
                        job_id: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            summary.job_results.push(result);
        }

        summary.jobs_triggered = summary.job_results.iter().filter(|r| r.success).count();
        summary.message =
            format!("Processed {} files, triggered {} jobs", observed, summary.jobs_triggered);
        tracing::info!(
            %mode,
            observed,
            skipped,
            triggered = summary.jobs_triggered,
            attempted = summary.job_results.len(),
            "sync cycle complete"
        );
        Ok(summary)
    }

    /// Resolve the cursor and fetch the entries for this cycle.
    async fn list_changes(&self) -> Result<Listing, PipelineError> {
        let key = self.monitored_path.as_str();
        let Some(cursor) = self.cursors.get_cursor(key).await? else {
            return self.baseline(SyncMode::Baseline).await;
        };

        match self.source.list_since(&cursor).await {
            Ok(ChangeBatch { cursor: next, entries }) => {
                self.cursors.set_cursor(key, &next).await?;
                tracing::debug!(entries = entries.len(), "incremental listing");
                Ok(Listing::Changes(SyncMode::Incremental, entries))
            }
            Err(ChangeSourceError::CursorExpired) => {
                tracing::warn!(folder = %key, "cursor expired, re-baselining");
                self.baseline(SyncMode::Rebaselined).await
            }
            Err(e) => {
                tracing::warn!(folder = %key, error = %e, "incremental listing failed, falling back to full scan");
                match self.source.list_initial(key).await {
                    Ok(batch) => Ok(Listing::Changes(SyncMode::Fallback, batch.entries)),
                    Err(e) => {
                        tracing::error!(folder = %key, error = %e, "fallback listing failed");
                        Ok(Listing::Done(SyncSummary::source_failure(SyncMode::Fallback, &e)))
                    }
                }
            }
        }
    }

    /// Store a fresh cursor without processing the existing contents.
    async fn baseline(&self, mode: SyncMode) -> Result<Listing, PipelineError> {
        let key = self.monitored_path.as_str();
        match self.source.list_initial(key).await {
            Ok(batch) => {
                self.cursors.set_cursor(key, &batch.cursor).await?;
                tracing::info!(folder = %key, existing = batch.entries.len(), %mode, "baseline cursor stored, skipping existing files");
                Ok(Listing::Done(SyncSummary::empty(mode, "Baseline cursor stored, existing files skipped")))
            }
            Err(e) => {
                tracing::error!(folder = %key, error = %e, "initial listing failed");
                Ok(Listing::Done(SyncSummary::source_failure(mode, &e)))
            }
        }
    }

    fn accepts(&self, entry: &ChangedEntry) -> bool {
        if entry.is_deleted {
            return false;
        }
        if !entry.is_under(&self.monitored_path) {
            tracing::debug!(path = %entry.path, "outside monitored folder");
            return false;
        }
        match entry.extension() {
            Some(ext) if self.supported_formats.contains(&ext) => true,
            _ => {
                tracing::debug!(name = %entry.name, "unsupported format");
                false
            }
        }
    }

    pub async fn processing_stats(&self) -> Result<ProcessingStats, PipelineError> {
        Ok(ProcessingStats {
            processed_count: self.tracker.processed_count().await?,
            monitored_path: self.monitored_path.clone(),
            supported_formats: self.supported_formats.clone(),
            cursor: self.cursors.get_cursor(&self.monitored_path).await?,
            runner: self.orchestration.runner_info(),
        })
    }

    /// Forget every cursor and ledger entry; the next cycle re-baselines.
    pub async fn reset_processing_state(&self) -> Result<(), PipelineError> {
        self.cursors.reset_all().await?;
        self.tracker.reset_all().await?;
        tracing::warn!("processing state reset");
        Ok(())
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;

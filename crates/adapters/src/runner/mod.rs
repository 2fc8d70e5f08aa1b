// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job runner adapters.
//!
//! # Module layout
//!
//! - [`local`] — subprocesses on this host, one directory per job
//! - [`batch`] — remote batch executions (Kubernetes `batch/v1` Jobs)
//! - [`registry`] — builds a runner from configuration
//!
//! Optional capabilities (logs, cleanup) are queried with `as_logs()` /
//! `as_cleanup()` rather than assumed.

pub mod batch;
pub mod local;
pub mod registry;

use std::time::Duration;

use async_trait::async_trait;
use relay_core::{JobId, JobSpec, JobState, JobStatus};
use relay_resilience::{CircuitOpen, Elapsed, Retryable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from job runner operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("job not found: {0}")]
    NotFound(JobId),

    #[error("runner authentication failed: {0}")]
    Auth(String),

    #[error("runner unavailable: {0}")]
    Transient(String),

    #[error("failed to launch job: {0}")]
    Spawn(String),

    #[error("invalid runner configuration: {0}")]
    Config(String),

    #[error("corrupt job metadata for {job_id}: {message}")]
    Metadata { job_id: JobId, message: String },

    #[error(transparent)]
    Timeout(#[from] Elapsed),

    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpen),

    #[error("runner I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Retryable for RunnerError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transient(_) | Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            Self::NotFound(_)
            | Self::Auth(_)
            | Self::Spawn(_)
            | Self::Config(_)
            | Self::Metadata { .. }
            | Self::CircuitOpen(_) => false,
        }
    }
}

/// Operations a runner supports, reported by `runner info`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub submit_job: bool,
    pub get_status: bool,
    pub cancel_job: bool,
    pub list_jobs: bool,
    pub get_logs: bool,
    pub cleanup: bool,
}

/// Adapter for an execution backend
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    /// Backend name (e.g. "local", "kubernetes")
    fn runner_type(&self) -> &str;

    /// Start a job; the returned id is assigned by the backend
    async fn submit(&self, spec: &JobSpec) -> Result<JobId, RunnerError>;

    /// Current state of a job, queried from the backend
    async fn status(&self, job_id: &JobId) -> Result<JobStatus, RunnerError>;

    /// Request cancellation. `false` when the job was not running.
    async fn cancel(&self, job_id: &JobId) -> Result<bool, RunnerError>;

    /// Most recent jobs first, optionally filtered by state
    async fn list_jobs(
        &self,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<JobStatus>, RunnerError>;

    fn as_logs(&self) -> Option<&dyn JobLogs> {
        None
    }

    fn as_cleanup(&self) -> Option<&dyn JobCleanup> {
        None
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            submit_job: true,
            get_status: true,
            cancel_job: true,
            list_jobs: true,
            get_logs: self.as_logs().is_some(),
            cleanup: self.as_cleanup().is_some(),
        }
    }
}

/// Optional capability: fetch job output
#[async_trait]
pub trait JobLogs: Send + Sync {
    /// Up to `max_lines` lines in chronological order
    async fn logs(&self, job_id: &JobId, max_lines: usize) -> Result<Vec<String>, RunnerError>;
}

/// Optional capability: delete finished job artifacts
#[async_trait]
pub trait JobCleanup: Send + Sync {
    /// Remove terminal jobs that finished more than `older_than` ago.
    /// Running jobs are never removed.
    async fn cleanup_finished(&self, older_than: Duration) -> Result<Vec<JobId>, RunnerError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeRunner, RunnerCall};

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

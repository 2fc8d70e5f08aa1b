// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `job.json`: the durable record of a local job.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use relay_core::{JobId, JobSpec, JobState, JobStatus, ResourceRequirements};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::runner::RunnerError;

pub(super) const META_FILE: &str = "job.json";
pub(super) const STDOUT_FILE: &str = "stdout.log";
pub(super) const STDERR_FILE: &str = "stderr.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(super) enum LocalStatus {
    Submitted,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl LocalStatus {
    pub(super) fn job_state(self) -> JobState {
        match self {
            Self::Submitted => JobState::Pending,
            Self::Running => JobState::Running,
            Self::Completed => JobState::Completed,
            Self::Failed => JobState::Failed,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    pub(super) fn is_terminal(self) -> bool {
        self.job_state().is_terminal()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct LocalJobMeta {
    pub job_id: JobId,
    pub job_type: String,
    #[serde(default)]
    pub input_data: BTreeMap<String, Value>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub resources: ResourceRequirements,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub submitted_at: DateTime<Utc>,
    pub status: LocalStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pid: Option<u32>,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub error: Option<String>,
}

impl LocalJobMeta {
    pub(super) fn new(job_id: JobId, spec: &JobSpec, submitted_at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            job_type: spec.job_type.clone(),
            input_data: spec.input_data.clone(),
            environment: spec.environment.clone(),
            resources: spec.resources.clone(),
            metadata: spec.metadata.clone(),
            submitted_at,
            status: LocalStatus::Submitted,
            started_at: None,
            completed_at: None,
            pid: None,
            exit_code: None,
            error: None,
        }
    }

    /// Record process exit unless a cancellation already finalized the job.
    pub(super) fn finish(&mut self, exit_code: Option<i32>, at: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }
        self.exit_code = exit_code;
        self.completed_at = Some(at);
        if exit_code == Some(0) {
            self.status = LocalStatus::Completed;
        } else {
            self.status = LocalStatus::Failed;
            self.error = Some(match exit_code {
                Some(code) => format!("process exited with code {}", code),
                None => "process terminated by signal".to_string(),
            });
        }
    }

    pub(super) fn to_status(&self) -> JobStatus {
        let mut status = JobStatus::new(self.job_id.clone(), self.status.job_state())
            .meta("job_type", self.job_type.clone())
            .meta("submitted_at", self.submitted_at.to_rfc3339());
        status.started_at = self.started_at;
        status.completed_at = self.completed_at;
        status.error = self.error.clone();
        if let Some(pid) = self.pid {
            status = status.meta("pid", pid);
        }
        if let Some(code) = self.exit_code {
            status = status.meta("exit_code", code);
        }
        status
    }
}

pub(super) fn meta_path(job_dir: &Path) -> PathBuf {
    job_dir.join(META_FILE)
}

pub(super) async fn read(job_dir: &Path, job_id: &JobId) -> Result<LocalJobMeta, RunnerError> {
    let bytes = match tokio::fs::read(meta_path(job_dir)).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RunnerError::NotFound(job_id.clone()))
        }
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map_err(|e| RunnerError::Metadata { job_id: job_id.clone(), message: e.to_string() })
}

/// Write via temp file + rename so concurrent pollers never read a torn file.
pub(super) async fn write(job_dir: &Path, meta: &LocalJobMeta) -> Result<(), RunnerError> {
    let bytes = serde_json::to_vec_pretty(meta)
        .map_err(|e| RunnerError::Metadata { job_id: meta.job_id.clone(), message: e.to_string() })?;
    let tmp = job_dir.join(format!("{}.{}.tmp", META_FILE, uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, meta_path(job_dir)).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote batch runner.
//!
//! [`BatchRunner`] speaks to a managed batch service through [`BatchApi`].
//! The API reports executions as a list of normalized conditions; the runner
//! owns the mapping from conditions to [`JobState`] so every backend agrees
//! on it.
//!
//! # Module layout
//!
//! - [`k8s`] — `BatchApi` over Kubernetes `batch/v1` Jobs
//! - `manifest` — Job manifest construction

mod k8s;
mod manifest;

pub use self::k8s::{KubeBatchApi, KubeRunnerConfig};

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{JobId, JobSpec, JobState, JobStatus, ResourceRequirements};
use relay_resilience::Retryable;

use super::{JobLogs, JobRunner, RunnerError};

/// A request to start one execution of the configured batch template
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub job_type: String,
    /// Overrides layered on top of the template's environment
    pub env: BTreeMap<String, String>,
    pub resources: ResourceRequirements,
    /// String-valued job metadata, carried as annotations
    pub annotations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionKind {
    Completed,
    Running,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: ConditionKind,
    pub status: bool,
    pub message: Option<String>,
}

impl Condition {
    pub fn new(kind: ConditionKind, status: bool) -> Self {
        Self { kind, status, message: None }
    }
}

/// Execution details as reported by the batch service
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Execution {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: Option<DateTime<Utc>>,
    pub message: String,
}

/// Client for a managed batch execution service
#[async_trait]
pub trait BatchApi: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Start an execution; returns its name
    async fn run_execution(&self, request: ExecutionRequest) -> Result<String, RunnerError>;

    async fn get_execution(&self, name: &str) -> Result<Execution, RunnerError>;

    async fn cancel_execution(&self, name: &str) -> Result<(), RunnerError>;

    /// Most recent executions first
    async fn list_executions(&self, limit: usize) -> Result<Vec<Execution>, RunnerError>;

    /// Log entries for an execution, newest first
    async fn query_logs(&self, name: &str, max_entries: usize) -> Result<Vec<LogEntry>, RunnerError>;
}

/// Map execution conditions to a job state.
///
/// Completed=true wins, then Completed=false, then Running=true. Anything
/// else is Pending: missing conditions mean the service has not reported
/// yet, not that the job failed.
pub fn map_conditions(conditions: &[Condition]) -> JobState {
    let completed = conditions.iter().find(|c| c.kind == ConditionKind::Completed);
    match completed {
        Some(c) if c.status => return JobState::Completed,
        Some(_) => return JobState::Failed,
        None => {}
    }
    if conditions.iter().any(|c| c.kind == ConditionKind::Running && c.status) {
        return JobState::Running;
    }
    JobState::Pending
}

fn execution_status(execution: &Execution) -> JobStatus {
    let state = if execution.cancelled {
        JobState::Cancelled
    } else {
        map_conditions(&execution.conditions)
    };
    let mut status = JobStatus::new(JobId::from(execution.name.clone()), state);
    status.started_at = execution.started_at;
    status.completed_at = execution.completed_at;
    if state == JobState::Failed {
        status.error = execution
            .conditions
            .iter()
            .find(|c| c.kind == ConditionKind::Completed)
            .and_then(|c| c.message.clone())
            .or_else(|| Some("execution failed".to_string()));
    }
    status
}

pub struct BatchRunner<A: BatchApi> {
    api: A,
}

impl<A: BatchApi> BatchRunner<A> {
    pub fn new(api: A) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &A {
        &self.api
    }
}

#[async_trait]
impl<A: BatchApi> JobRunner for BatchRunner<A> {
    fn runner_type(&self) -> &str {
        self.api.name()
    }

    async fn submit(&self, spec: &JobSpec) -> Result<JobId, RunnerError> {
        let annotations = spec
            .metadata
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect();
        let request = ExecutionRequest {
            job_type: spec.job_type.clone(),
            env: spec.environment.clone(),
            resources: spec.resources.clone(),
            annotations,
        };
        let name = self.api.run_execution(request).await?;
        tracing::info!(execution = %name, job_type = %spec.job_type, "batch execution started");
        Ok(JobId::from(name))
    }

    async fn status(&self, job_id: &JobId) -> Result<JobStatus, RunnerError> {
        match self.api.get_execution(job_id.as_str()).await {
            Ok(execution) => Ok(execution_status(&execution)),
            Err(e) if e.is_retryable() => {
                tracing::warn!(%job_id, error = %e, "execution details unavailable, reporting pending");
                Ok(JobStatus::pending(job_id.clone()).meta("status_error", e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn cancel(&self, job_id: &JobId) -> Result<bool, RunnerError> {
        match self.api.cancel_execution(job_id.as_str()).await {
            Ok(()) => {
                tracing::info!(%job_id, "batch execution cancelled");
                Ok(true)
            }
            Err(RunnerError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_jobs(
        &self,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<JobStatus>, RunnerError> {
        let executions = self.api.list_executions(limit).await?;
        Ok(executions
            .iter()
            .map(execution_status)
            .filter(|s| state.map_or(true, |want| s.state == want))
            .take(limit)
            .collect())
    }

    fn as_logs(&self) -> Option<&dyn JobLogs> {
        Some(self)
    }
}

#[async_trait]
impl<A: BatchApi> JobLogs for BatchRunner<A> {
    async fn logs(&self, job_id: &JobId, max_lines: usize) -> Result<Vec<String>, RunnerError> {
        let mut entries = self.api.query_logs(job_id.as_str(), max_lines).await?;
        entries.truncate(max_lines);
        entries.reverse();
        Ok(entries
            .into_iter()
            .map(|entry| match entry.timestamp {
                Some(ts) => format!("{} {}", ts.to_rfc3339(), entry.message),
                None => entry.message,
            })
            .collect())
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

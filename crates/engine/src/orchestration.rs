// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job orchestration over a [`JobRunner`].
//!
//! The runner is the source of truth for job state; the service keeps a
//! cache of the jobs it submitted so `list_active` knows what to poll.
//! Every runner call is bounded by a timeout and guarded by a circuit
//! breaker. Status, list and cancel are retried; submit is not, since a
//! retried submit could start the same job twice.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use parking_lot::Mutex;
use relay_adapters::{Capabilities, JobRunner, RunnerError};
use relay_core::{Clock, JobId, JobSpec, JobState, JobStatus, ResourceRequirements, SourceRef, SystemClock};
use relay_resilience::{with_timeout, BreakerConfig, CircuitBreaker, CircuitState, RetryPolicy, Retryable};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;

use crate::config::OrchestrationConfig;
use crate::env::{ENV_SINGLE_ITEM, ENV_SOURCE_NAME, ENV_SOURCE_PATH};

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("job submission failed for {path}: {source}")]
    Submit {
        path: String,
        #[source]
        source: RunnerError,
    },

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("job {job_id} did not finish within {}s", .waited.as_secs())]
    WaitTimeout { job_id: JobId, waited: Duration },

    #[error("runner '{runner}' does not support {operation}")]
    Unsupported { runner: String, operation: &'static str },
}

#[derive(Debug, Clone)]
pub struct OrchestrationSettings {
    pub job_type: String,
    pub resources: ResourceRequirements,
    pub max_concurrent: usize,
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub breaker: BreakerConfig,
}

impl Default for OrchestrationSettings {
    fn default() -> Self {
        Self::from(&OrchestrationConfig::default())
    }
}

impl From<&OrchestrationConfig> for OrchestrationSettings {
    fn from(config: &OrchestrationConfig) -> Self {
        Self {
            job_type: config.job_type.clone(),
            resources: config.resources.clone(),
            max_concurrent: config.max_concurrent,
            call_timeout: config.call_timeout(),
            retry: config.retry.policy(),
            breaker: config.breaker.config(),
        }
    }
}

impl OrchestrationSettings {
    relay_core::setters! {
        into { job_type: String }
        set {
            resources: ResourceRequirements,
            max_concurrent: usize,
            call_timeout: Duration,
            retry: RetryPolicy,
            breaker: BreakerConfig,
        }
    }
}

/// Summary reported by `runner info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunnerInfo {
    pub runner_type: String,
    pub active_jobs: usize,
    pub capabilities: Capabilities,
    pub circuit: CircuitState,
}

pub struct OrchestrationService<C: Clock = SystemClock> {
    runner: Arc<dyn JobRunner>,
    settings: OrchestrationSettings,
    breaker: CircuitBreaker<C>,
    clock: C,
    jobs: Mutex<HashMap<JobId, JobStatus>>,
}

impl OrchestrationService<SystemClock> {
    pub fn new(runner: Arc<dyn JobRunner>, settings: OrchestrationSettings) -> Self {
        Self::with_clock(runner, settings, SystemClock)
    }
}

impl<C: Clock> OrchestrationService<C> {
    pub fn with_clock(runner: Arc<dyn JobRunner>, settings: OrchestrationSettings, clock: C) -> Self {
        let breaker = CircuitBreaker::with_clock(
            format!("runner:{}", runner.runner_type()),
            settings.breaker.clone(),
            clock.clone(),
        );
        Self { runner, settings, breaker, clock, jobs: Mutex::new(HashMap::new()) }
    }

    pub fn settings(&self) -> &OrchestrationSettings {
        &self.settings
    }

    pub fn runner(&self) -> &Arc<dyn JobRunner> {
        &self.runner
    }

    /// Run one runner call under the timeout and breaker.
    ///
    /// Only unavailability (retryable errors) counts against the breaker;
    /// a definite answer such as NotFound means the backend is healthy.
    async fn guarded<T, Fut>(&self, label: &str, call: Fut) -> Result<T, RunnerError>
    where
        Fut: Future<Output = Result<T, RunnerError>>,
    {
        self.breaker.try_acquire()?;
        let result = match with_timeout(label, self.settings.call_timeout, call).await {
            Ok(result) => result,
            Err(elapsed) => Err(RunnerError::from(elapsed)),
        };
        match &result {
            Err(e) if e.is_retryable() => self.breaker.record_failure(),
            _ => self.breaker.record_success(),
        }
        result
    }

    /// Submit a job for one source item.
    ///
    /// The job environment carries the item's path and name plus
    /// `extra_env`; the item variables win on conflict.
    pub async fn submit_job(
        &self,
        source: &SourceRef,
        extra_env: BTreeMap<String, String>,
    ) -> Result<JobId, OrchestrationError> {
        let now = self.clock.utc_now();
        let spec = JobSpec::new(self.settings.job_type.clone())
            .resources(self.settings.resources.clone())
            .input("file_path", source.path.clone())
            .input("file_name", source.name.clone())
            .envs(extra_env)
            .env(ENV_SINGLE_ITEM, "true")
            .env(ENV_SOURCE_PATH, source.path.clone())
            .env(ENV_SOURCE_NAME, source.name.clone())
            .meta("submitted_at", now.to_rfc3339())
            .meta("file_name", source.name.clone());

        let job_id = self
            .guarded("submit", self.runner.submit(&spec))
            .await
            .map_err(|e| OrchestrationError::Submit { path: source.path.clone(), source: e })?;

        let status = JobStatus::pending(job_id.clone())
            .started_at(now)
            .meta("file_name", source.name.clone())
            .meta("file_path", source.path.clone());
        self.jobs.lock().insert(job_id.clone(), status);
        tracing::info!(%job_id, path = %source.path, job_type = %self.settings.job_type, "job submitted");
        Ok(job_id)
    }

    /// Submit one job per source with at most `max_concurrent` submissions
    /// in flight. Failures are logged and left out of the result.
    pub async fn submit_batch(&self, sources: &[SourceRef], max_concurrent: usize) -> Vec<JobId> {
        let semaphore = Semaphore::new(max_concurrent.max(1));
        let semaphore = &semaphore;
        let results = join_all(sources.iter().map(|source| async move {
            // The semaphore is never closed, so acquire cannot fail
            let _permit = semaphore.acquire().await.ok();
            (source, self.submit_job(source, BTreeMap::new()).await)
        }))
        .await;

        let mut job_ids = Vec::with_capacity(results.len());
        for (source, result) in results {
            match result {
                Ok(job_id) => job_ids.push(job_id),
                Err(e) => tracing::error!(path = %source.path, error = %e, "batch submission failed"),
            }
        }
        tracing::info!(submitted = job_ids.len(), requested = sources.len(), "batch submitted");
        job_ids
    }

    /// Query the runner and refresh the cache.
    pub async fn status(&self, job_id: &JobId) -> Result<JobStatus, OrchestrationError> {
        let mut status = self
            .settings
            .retry
            .run("status", || self.guarded("status", self.runner.status(job_id)))
            .await?;

        let mut jobs = self.jobs.lock();
        if let Some(previous) = jobs.get(job_id) {
            for (key, value) in &previous.metadata {
                status.metadata.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        jobs.insert(job_id.clone(), status.clone());
        Ok(status)
    }

    /// Refresh every cached job; terminal jobs are evicted and the rest
    /// returned. A job whose refresh fails is reported from the cache.
    pub async fn list_active(&self) -> Vec<JobStatus> {
        let ids: Vec<JobId> = {
            let mut ids: Vec<JobId> = self.jobs.lock().keys().cloned().collect();
            ids.sort();
            ids
        };

        let mut active = Vec::new();
        for job_id in ids {
            match self.status(&job_id).await {
                Ok(status) if status.is_terminal() => {
                    self.jobs.lock().remove(&job_id);
                    tracing::debug!(%job_id, state = %status.state, "job finished, evicted");
                }
                Ok(status) => active.push(status),
                Err(e) => {
                    tracing::warn!(%job_id, error = %e, "status refresh failed, using cached state");
                    if let Some(cached) = self.jobs.lock().get(&job_id) {
                        active.push(cached.clone());
                    }
                }
            }
        }
        active
    }

    /// Jobs known to the runner, most recent first.
    pub async fn list_jobs(
        &self,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<JobStatus>, OrchestrationError> {
        let jobs = self
            .settings
            .retry
            .run("list_jobs", || self.guarded("list_jobs", self.runner.list_jobs(state, limit)))
            .await?;
        Ok(jobs)
    }

    /// Cancel a job. Returns false when the runner had nothing to cancel.
    pub async fn cancel(&self, job_id: &JobId) -> Result<bool, OrchestrationError> {
        let cancelled = self
            .settings
            .retry
            .run("cancel", || self.guarded("cancel", self.runner.cancel(job_id)))
            .await?;
        if cancelled {
            if let Some(status) = self.jobs.lock().get_mut(job_id) {
                status.state = JobState::Cancelled;
            }
            tracing::info!(%job_id, "job cancelled");
        }
        Ok(cancelled)
    }

    /// Poll until the job is terminal or `timeout` has passed.
    pub async fn wait_for_completion(
        &self,
        job_id: &JobId,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Result<JobStatus, OrchestrationError> {
        let started = tokio::time::Instant::now();
        loop {
            let status = self.status(job_id).await?;
            if status.is_terminal() {
                return Ok(status);
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(OrchestrationError::WaitTimeout { job_id: job_id.clone(), waited });
            }
            tracing::debug!(%job_id, state = %status.state, "waiting for job");
            tokio::time::sleep(poll_interval.min(timeout - waited)).await;
        }
    }

    /// Tail of the job's output, oldest line first. Empty when the runner
    /// cannot provide logs.
    pub async fn logs(&self, job_id: &JobId, max_lines: usize) -> Result<Vec<String>, OrchestrationError> {
        let Some(logs) = self.runner.as_logs() else {
            tracing::warn!(runner = %self.runner.runner_type(), "runner does not provide logs");
            return Ok(Vec::new());
        };
        Ok(self.guarded("logs", logs.logs(job_id, max_lines)).await?)
    }

    /// Delete artifacts of jobs that finished more than `older_than` ago.
    pub async fn cleanup(&self, older_than: Duration) -> Result<Vec<JobId>, OrchestrationError> {
        let Some(cleanup) = self.runner.as_cleanup() else {
            return Err(OrchestrationError::Unsupported {
                runner: self.runner.runner_type().to_string(),
                operation: "cleanup",
            });
        };
        let removed = self.guarded("cleanup", cleanup.cleanup_finished(older_than)).await?;
        tracing::info!(removed = removed.len(), "finished jobs cleaned up");
        Ok(removed)
    }

    pub fn runner_info(&self) -> RunnerInfo {
        RunnerInfo {
            runner_type: self.runner.runner_type().to_string(),
            active_jobs: self.jobs.lock().len(),
            capabilities: self.runner.capabilities(),
            circuit: self.breaker.state(),
        }
    }
}

#[cfg(test)]
#[path = "orchestration_tests.rs"]
mod tests;

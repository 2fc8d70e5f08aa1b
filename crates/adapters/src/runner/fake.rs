// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instrumented in-memory runner for tests.

#![cfg_attr(coverage_nightly, coverage(off))]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{JobId, JobSpec, JobState, JobStatus};

use super::{JobLogs, JobRunner, RunnerError};

/// Recorded runner call
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerCall {
    Submit(JobSpec),
    Status(JobId),
    Cancel(JobId),
    List { state: Option<JobState>, limit: usize },
}

#[derive(Default)]
struct FakeRunnerState {
    calls: Vec<RunnerCall>,
    next_id: u64,
    order: Vec<JobId>,
    jobs: HashMap<JobId, JobStatus>,
    scripted: HashMap<JobId, VecDeque<JobState>>,
    logs: HashMap<JobId, Vec<String>>,
    failing_inputs: HashSet<String>,
    failing_statuses: u32,
    submit_delay: Duration,
    in_flight: usize,
    max_in_flight: usize,
}

/// Fake job runner.
///
/// Job ids are `fake-<N>`. Submissions fail for specs whose `input_data`
/// contains a value registered with [`FakeRunner::fail_submits_for`].
#[derive(Clone)]
pub struct FakeRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
    with_logs: bool,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRunner {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(FakeRunnerState::default())), with_logs: false }
    }

    /// Expose the logs capability
    pub fn with_logs(mut self) -> Self {
        self.with_logs = true;
        self
    }

    /// Hold each submission for `delay` (to observe concurrency)
    pub fn set_submit_delay(&self, delay: Duration) {
        self.inner.lock().submit_delay = delay;
    }

    /// Fail any submission whose input data contains `value`
    pub fn fail_submits_for(&self, value: &str) {
        self.inner.lock().failing_inputs.insert(value.to_string());
    }

    /// Make the next `n` status calls fail transiently
    pub fn fail_next_statuses(&self, n: u32) {
        self.inner.lock().failing_statuses = n;
    }

    /// Force the state of a job
    pub fn set_state(&self, job_id: &JobId, state: JobState) {
        let mut inner = self.inner.lock();
        inner.jobs.entry(job_id.clone()).or_insert_with(|| JobStatus::pending(job_id.clone())).state =
            state;
    }

    /// States returned by successive status calls; the last one sticks
    pub fn script_states(&self, job_id: &JobId, states: impl IntoIterator<Item = JobState>) {
        self.inner.lock().scripted.insert(job_id.clone(), states.into_iter().collect());
    }

    pub fn set_logs(&self, job_id: &JobId, lines: Vec<String>) {
        self.inner.lock().logs.insert(job_id.clone(), lines);
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<RunnerCall> {
        self.inner.lock().calls.clone()
    }

    /// Specs of all accepted and rejected submissions, in call order
    pub fn submitted(&self) -> Vec<JobSpec> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RunnerCall::Submit(spec) => Some(spec.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn status_calls(&self) -> usize {
        self.inner.lock().calls.iter().filter(|c| matches!(c, RunnerCall::Status(_))).count()
    }

    /// Highest number of submissions observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.inner.lock().max_in_flight
    }
}

#[async_trait]
impl JobRunner for FakeRunner {
    fn runner_type(&self) -> &str {
        "fake"
    }

    async fn submit(&self, spec: &JobSpec) -> Result<JobId, RunnerError> {
        let delay = {
            let mut inner = self.inner.lock();
            inner.calls.push(RunnerCall::Submit(spec.clone()));
            inner.in_flight += 1;
            inner.max_in_flight = inner.max_in_flight.max(inner.in_flight);
            inner.submit_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        inner.in_flight -= 1;
        let rejected = spec
            .input_data
            .values()
            .filter_map(|v| v.as_str())
            .any(|v| inner.failing_inputs.contains(v));
        if rejected {
            return Err(RunnerError::Spawn("injected submit failure".to_string()));
        }
        inner.next_id += 1;
        let id = JobId::from(format!("fake-{}", inner.next_id));
        inner.order.push(id.clone());
        inner.jobs.insert(id.clone(), JobStatus::pending(id.clone()));
        Ok(id)
    }

    async fn status(&self, job_id: &JobId) -> Result<JobStatus, RunnerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RunnerCall::Status(job_id.clone()));
        if inner.failing_statuses > 0 {
            inner.failing_statuses -= 1;
            return Err(RunnerError::Transient("injected status failure".to_string()));
        }
        let scripted = match inner.scripted.get_mut(job_id) {
            Some(states) if states.len() > 1 => states.pop_front(),
            Some(states) => states.front().copied(),
            None => None,
        };
        let status = inner.jobs.get_mut(job_id).ok_or_else(|| RunnerError::NotFound(job_id.clone()))?;
        if let Some(state) = scripted {
            status.state = state;
        }
        Ok(status.clone())
    }

    async fn cancel(&self, job_id: &JobId) -> Result<bool, RunnerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RunnerCall::Cancel(job_id.clone()));
        inner.scripted.remove(job_id);
        match inner.jobs.get_mut(job_id) {
            Some(status) if !status.is_terminal() => {
                status.state = JobState::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_jobs(
        &self,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<JobStatus>, RunnerError> {
        let mut inner = self.inner.lock();
        inner.calls.push(RunnerCall::List { state, limit });
        Ok(inner
            .order
            .iter()
            .rev()
            .filter_map(|id| inner.jobs.get(id))
            .filter(|s| state.map_or(true, |want| s.state == want))
            .take(limit)
            .cloned()
            .collect())
    }

    fn as_logs(&self) -> Option<&dyn JobLogs> {
        self.with_logs.then_some(self as &dyn JobLogs)
    }
}

#[async_trait]
impl JobLogs for FakeRunner {
    async fn logs(&self, job_id: &JobId, max_lines: usize) -> Result<Vec<String>, RunnerError> {
        let inner = self.inner.lock();
        let lines = inner.logs.get(job_id).cloned().unwrap_or_default();
        let skip = lines.len().saturating_sub(max_lines);
        Ok(lines.into_iter().skip(skip).collect())
    }
}

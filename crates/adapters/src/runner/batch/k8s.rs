// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes batch API: each execution is a `batch/v1` Job.
//!
//! Job conditions are normalized for the runner: `Complete=True` becomes
//! Completed=true, `Failed=True` becomes Completed=false, and active pods
//! become Running=true. Cancellation suspends the Job (Kubernetes terminates
//! its pods) and marks it with an annotation so it reads back as cancelled.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, ListParams, LogParams, Patch, PatchParams, PostParams};
use kube::Client;
use relay_core::JobId;
use serde::{Deserialize, Serialize};

use super::manifest::{self, CANCEL_ANNOTATION, MANAGED_BY, MANAGED_BY_LABEL};
use super::{BatchApi, Condition, ConditionKind, Execution, ExecutionRequest, LogEntry};
use crate::runner::RunnerError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeRunnerConfig {
    pub namespace: String,
    /// Worker container image
    pub image: String,
    /// Overrides the image entrypoint when non-empty
    pub command: Vec<String>,
    pub service_account: Option<String>,
    /// Pod retries before the Job is marked failed
    pub backoff_limit: i32,
    pub ttl_seconds_after_finished: Option<i32>,
    /// Prefix for generated Job names
    pub name_prefix: String,
    /// Environment shared by every execution
    pub env: BTreeMap<String, String>,
}

impl Default for KubeRunnerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            image: "relay-worker:latest".to_string(),
            command: Vec::new(),
            service_account: None,
            backoff_limit: 0,
            ttl_seconds_after_finished: Some(86_400),
            name_prefix: "relay-job".to_string(),
            env: BTreeMap::new(),
        }
    }
}

#[derive(Clone)]
pub struct KubeBatchApi {
    client: Client,
    config: KubeRunnerConfig,
}

impl KubeBatchApi {
    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn connect(config: KubeRunnerConfig) -> Result<Self, RunnerError> {
        let client = Client::try_default()
            .await
            .map_err(|e| RunnerError::Config(format!("failed to create kube client: {}", e)))?;
        Ok(Self::new(client, config))
    }

    pub fn new(client: Client, config: KubeRunnerConfig) -> Self {
        Self { client, config }
    }

    fn jobs(&self) -> Api<Job> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.config.namespace)
    }

    fn execution_name(&self) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}", self.config.name_prefix, suffix.get(..12).unwrap_or(&suffix))
    }
}

fn api_error(err: kube::Error, name: &str) -> RunnerError {
    match err {
        kube::Error::Api(resp) => match resp.code {
            404 => RunnerError::NotFound(JobId::from(name)),
            401 | 403 => RunnerError::Auth(resp.message),
            409 | 429 | 500..=599 => RunnerError::Transient(resp.message),
            _ => RunnerError::Spawn(format!("{} ({})", resp.message, resp.reason)),
        },
        other => RunnerError::Transient(other.to_string()),
    }
}

pub(super) fn job_to_execution(job: &Job) -> Execution {
    let cancelled = job
        .metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(CANCEL_ANNOTATION))
        .is_some_and(|v| v == "true");
    let status = job.status.as_ref();

    let mut conditions: Vec<Condition> = status
        .and_then(|s| s.conditions.as_ref())
        .into_iter()
        .flatten()
        .map(|c| {
            let is_true = c.status == "True";
            let message = c.message.clone().or_else(|| c.reason.clone());
            let (kind, value) = match c.type_.as_str() {
                "Complete" if is_true => (ConditionKind::Completed, true),
                "Failed" if is_true => (ConditionKind::Completed, false),
                other => (ConditionKind::Other(other.to_string()), is_true),
            };
            Condition { kind, status: value, message }
        })
        .collect();
    if status.and_then(|s| s.active).unwrap_or(0) > 0 {
        conditions.push(Condition::new(ConditionKind::Running, true));
    }

    Execution {
        name: job.metadata.name.clone().unwrap_or_default(),
        conditions,
        cancelled,
        started_at: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
        completed_at: status.and_then(|s| s.completion_time.as_ref()).map(|t| t.0),
    }
}

/// Parse a `kubectl logs --timestamps` line.
pub(super) fn parse_log_line(line: &str) -> LogEntry {
    if let Some((ts, message)) = line.split_once(' ') {
        if let Ok(parsed) = DateTime::parse_from_rfc3339(ts) {
            return LogEntry {
                timestamp: Some(parsed.with_timezone(&Utc)),
                message: message.to_string(),
            };
        }
    }
    LogEntry { timestamp: None, message: line.to_string() }
}

#[async_trait]
impl BatchApi for KubeBatchApi {
    fn name(&self) -> &str {
        "kubernetes"
    }

    async fn run_execution(&self, request: ExecutionRequest) -> Result<String, RunnerError> {
        let name = self.execution_name();
        let job = manifest::build_job(&name, &self.config, &request);
        self.jobs().create(&PostParams::default(), &job).await.map_err(|e| api_error(e, &name))?;
        tracing::debug!(job = %name, namespace = %self.config.namespace, "created batch job");
        Ok(name)
    }

    async fn get_execution(&self, name: &str) -> Result<Execution, RunnerError> {
        let job = self.jobs().get(name).await.map_err(|e| api_error(e, name))?;
        Ok(job_to_execution(&job))
    }

    async fn cancel_execution(&self, name: &str) -> Result<(), RunnerError> {
        let patch = serde_json::json!({
            "metadata": { "annotations": { CANCEL_ANNOTATION: "true" } },
            "spec": { "suspend": true },
        });
        self.jobs()
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| api_error(e, name))?;
        Ok(())
    }

    async fn list_executions(&self, limit: usize) -> Result<Vec<Execution>, RunnerError> {
        let selector = format!("{}={}", MANAGED_BY_LABEL, MANAGED_BY);
        let list = self
            .jobs()
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| api_error(e, &selector))?;
        let mut jobs = list.items;
        // The API pages in key order; sort so the limit keeps the newest
        jobs.sort_by(|a, b| {
            let created = |j: &Job| j.metadata.creation_timestamp.as_ref().map(|t| t.0);
            created(b).cmp(&created(a))
        });
        Ok(jobs.iter().take(limit).map(job_to_execution).collect())
    }

    async fn query_logs(&self, name: &str, max_entries: usize) -> Result<Vec<LogEntry>, RunnerError> {
        let selector = format!("job-name={}", name);
        let pods = self
            .pods()
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| api_error(e, name))?;

        let params = LogParams {
            timestamps: true,
            tail_lines: i64::try_from(max_entries).ok(),
            ..Default::default()
        };
        let mut entries = Vec::new();
        for pod in pods.items {
            let Some(pod_name) = pod.metadata.name else { continue };
            match self.pods().logs(&pod_name, &params).await {
                Ok(text) => entries.extend(text.lines().rev().map(parse_log_line)),
                Err(e) => tracing::debug!(pod = %pod_name, error = %e, "no logs for pod"),
            }
        }
        // Stable sort keeps per-pod newest-first order among equal timestamps
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(max_entries);
        Ok(entries)
    }
}

#[cfg(test)]
#[path = "k8s_tests.rs"]
mod tests;

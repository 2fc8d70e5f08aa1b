// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local subprocess runner.
//!
//! Each job gets `<work_dir>/<job_id>/` holding `job.json`, `stdout.log`, and
//! `stderr.log`. Children spawned by this process are tracked in memory;
//! jobs from earlier processes are answered from `job.json` alone.

mod meta;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use relay_core::{JobId, JobSpec, JobState, JobStatus};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};

use self::meta::{LocalJobMeta, LocalStatus, STDERR_FILE, STDOUT_FILE};
use super::{JobCleanup, JobLogs, JobRunner, RunnerError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalRunnerConfig {
    /// Parent directory of per-job directories
    pub work_dir: PathBuf,
    /// Worker program and arguments
    pub command: Vec<String>,
    /// Time between SIGTERM and SIGKILL on cancel
    pub grace_period_secs: u64,
}

impl Default for LocalRunnerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from(".local_jobs"),
            command: vec!["relay-worker".to_string()],
            grace_period_secs: 10,
        }
    }
}

#[derive(Clone)]
pub struct LocalRunner {
    config: LocalRunnerConfig,
    children: Arc<Mutex<HashMap<JobId, Child>>>,
    /// Held across every `job.json` read-modify-write and every status read
    records: Arc<tokio::sync::Mutex<()>>,
}

impl LocalRunner {
    pub fn new(config: LocalRunnerConfig) -> Result<Self, RunnerError> {
        if config.command.first().map_or(true, |program| program.trim().is_empty()) {
            return Err(RunnerError::Config("local runner command is empty".to_string()));
        }
        Ok(Self {
            config,
            children: Arc::new(Mutex::new(HashMap::new())),
            records: Arc::new(tokio::sync::Mutex::new(())),
        })
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.work_dir
    }

    fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.config.work_dir.join(job_id.as_str())
    }

    fn grace_period(&self) -> Duration {
        Duration::from_secs(self.config.grace_period_secs)
    }

    /// Number of children this process is still tracking.
    pub fn tracked_jobs(&self) -> usize {
        self.children.lock().len()
    }

    async fn spawn(&self, job_id: &JobId, job_dir: &Path, spec: &JobSpec) -> Result<Child, RunnerError> {
        let stdout = tokio::fs::File::create(job_dir.join(STDOUT_FILE)).await?.into_std().await;
        let stderr = tokio::fs::File::create(job_dir.join(STDERR_FILE)).await?.into_std().await;
        let input = serde_json::to_string(&spec.input_data)
            .map_err(|e| RunnerError::Spawn(format!("unserializable input data: {}", e)))?;

        let (program, args) = match self.config.command.split_first() {
            Some(parts) => parts,
            None => return Err(RunnerError::Config("local runner command is empty".to_string())),
        };
        Command::new(program)
            .args(args)
            .envs(&spec.environment)
            .env("RELAY_JOB_ID", job_id.as_str())
            .env("RELAY_JOB_TYPE", &spec.job_type)
            .env("RELAY_JOB_INPUT", input)
            .current_dir(job_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| RunnerError::Spawn(format!("{}: {}", program, e)))
    }

    /// Persist the exit of a child the caller has already stopped tracking.
    ///
    /// Callers hold `records`.
    async fn finalize(&self, job_id: &JobId, exit: ExitStatus) -> Result<JobStatus, RunnerError> {
        let job_dir = self.job_dir(job_id);
        let mut meta = meta::read(&job_dir, job_id).await?;
        if meta.status.is_terminal() {
            return Ok(meta.to_status());
        }
        meta.finish(exit.code(), Utc::now());
        meta::write(&job_dir, &meta).await?;
        tracing::info!(%job_id, status = ?meta.status, exit_code = ?meta.exit_code, "local job finished");
        Ok(meta.to_status())
    }

    /// Job directories, newest first.
    async fn job_dirs(&self) -> Result<Vec<(JobId, PathBuf, SystemTime)>, RunnerError> {
        let mut dirs = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.config.work_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_dir() {
                continue;
            }
            let created = meta.created().or_else(|_| meta.modified()).unwrap_or(SystemTime::UNIX_EPOCH);
            let job_id = JobId::from(entry.file_name().to_string_lossy().into_owned());
            dirs.push((job_id, entry.path(), created));
        }
        dirs.sort_by(|a, b| b.2.cmp(&a.2));
        Ok(dirs)
    }
}

#[async_trait]
impl JobRunner for LocalRunner {
    fn runner_type(&self) -> &str {
        "local"
    }

    async fn submit(&self, spec: &JobSpec) -> Result<JobId, RunnerError> {
        let job_id = JobId::from(uuid::Uuid::new_v4().to_string());
        let job_dir = self.job_dir(&job_id);
        tokio::fs::create_dir_all(&job_dir).await?;

        let mut meta = LocalJobMeta::new(job_id.clone(), spec, Utc::now());
        meta::write(&job_dir, &meta).await?;

        let mut child = match self.spawn(&job_id, &job_dir, spec).await {
            Ok(child) => child,
            Err(e) => {
                meta.status = LocalStatus::Failed;
                meta.completed_at = Some(Utc::now());
                meta.error = Some(e.to_string());
                if let Err(write_err) = meta::write(&job_dir, &meta).await {
                    tracing::warn!(%job_id, error = %write_err, "failed to record spawn failure");
                }
                tracing::error!(%job_id, error = %e, "local job failed to start");
                return Err(e);
            }
        };

        meta.status = LocalStatus::Running;
        meta.started_at = Some(Utc::now());
        meta.pid = child.id();
        // Persist before tracking so a racing poll never finalizes a stale record
        if let Err(e) = meta::write(&job_dir, &meta).await {
            let _ = child.start_kill();
            return Err(e);
        }
        self.children.lock().insert(job_id.clone(), child);

        tracing::info!(%job_id, job_type = %spec.job_type, pid = ?meta.pid, "local job started");
        Ok(job_id)
    }

    async fn status(&self, job_id: &JobId) -> Result<JobStatus, RunnerError> {
        let _records = self.records.lock().await;
        // Exactly one poll observes the exit and takes the child out
        let polled = {
            let mut children = self.children.lock();
            let polled = children.get_mut(job_id).map(|child| child.try_wait());
            if let Some(Ok(Some(_))) = polled {
                children.remove(job_id);
            }
            polled
        };
        match polled {
            Some(Ok(Some(exit))) => self.finalize(job_id, exit).await,
            Some(Ok(None)) => {
                let meta = meta::read(&self.job_dir(job_id), job_id).await?;
                Ok(meta.to_status().state(JobState::Running))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(meta::read(&self.job_dir(job_id), job_id).await?.to_status()),
        }
    }

    async fn cancel(&self, job_id: &JobId) -> Result<bool, RunnerError> {
        let Some(mut child) = self.children.lock().remove(job_id) else {
            tracing::warn!(%job_id, "cancel requested for untracked job");
            return Ok(false);
        };

        if let Some(exit) = child.try_wait()? {
            let _records = self.records.lock().await;
            self.finalize(job_id, exit).await?;
            return Ok(false);
        }

        if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
            if let Err(e) = kill(Pid::from_raw(pid), Signal::SIGTERM) {
                tracing::warn!(%job_id, pid, error = %e, "SIGTERM failed");
            }
        }
        let exit = match tokio::time::timeout(self.grace_period(), child.wait()).await {
            Ok(exit) => exit?,
            Err(_) => {
                tracing::warn!(%job_id, grace_secs = self.config.grace_period_secs, "job ignored SIGTERM, killing");
                child.kill().await?;
                child.wait().await?
            }
        };

        let _records = self.records.lock().await;
        let job_dir = self.job_dir(job_id);
        let mut meta = meta::read(&job_dir, job_id).await?;
        meta.status = LocalStatus::Cancelled;
        meta.completed_at = Some(Utc::now());
        meta.exit_code = exit.code();
        meta::write(&job_dir, &meta).await?;
        tracing::info!(%job_id, "local job cancelled");
        Ok(true)
    }

    async fn list_jobs(
        &self,
        state: Option<JobState>,
        limit: usize,
    ) -> Result<Vec<JobStatus>, RunnerError> {
        let mut jobs = Vec::new();
        for (job_id, _, _) in self.job_dirs().await? {
            if jobs.len() >= limit {
                break;
            }
            let status = match self.status(&job_id).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(%job_id, error = %e, "skipping unreadable job directory");
                    continue;
                }
            };
            if state.map_or(true, |want| status.state == want) {
                jobs.push(status);
            }
        }
        Ok(jobs)
    }

    fn as_logs(&self) -> Option<&dyn JobLogs> {
        Some(self)
    }

    fn as_cleanup(&self) -> Option<&dyn JobCleanup> {
        Some(self)
    }
}

/// Last `max_lines` lines of `path`, prefixed with `label`; empty if absent.
async fn tail(path: &Path, label: &str, max_lines: usize) -> Result<Vec<String>, RunnerError> {
    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut lines = BufReader::new(file).lines();
    let mut window = std::collections::VecDeque::with_capacity(max_lines.min(1024));
    while let Some(line) = lines.next_line().await? {
        if window.len() == max_lines {
            window.pop_front();
        }
        if max_lines > 0 {
            window.push_back(format!("{}: {}", label, line));
        }
    }
    Ok(window.into())
}

#[async_trait]
impl JobLogs for LocalRunner {
    async fn logs(&self, job_id: &JobId, max_lines: usize) -> Result<Vec<String>, RunnerError> {
        let job_dir = self.job_dir(job_id);
        if !tokio::fs::try_exists(&job_dir).await? {
            return Err(RunnerError::NotFound(job_id.clone()));
        }
        let mut lines = tail(&job_dir.join(STDOUT_FILE), "STDOUT", max_lines).await?;
        lines.extend(tail(&job_dir.join(STDERR_FILE), "STDERR", max_lines).await?);
        Ok(lines)
    }
}

#[async_trait]
impl JobCleanup for LocalRunner {
    async fn cleanup_finished(&self, older_than: Duration) -> Result<Vec<JobId>, RunnerError> {
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut removed = Vec::new();
        for (job_id, dir, _) in self.job_dirs().await? {
            if self.children.lock().contains_key(&job_id) {
                continue;
            }
            let meta = match meta::read(&dir, &job_id).await {
                Ok(meta) => meta,
                Err(e) => {
                    tracing::debug!(%job_id, error = %e, "skipping job without readable metadata");
                    continue;
                }
            };
            if !meta.status.is_terminal() {
                continue;
            }
            let finished_at = meta.completed_at.unwrap_or(meta.submitted_at);
            if finished_at >= cutoff {
                continue;
            }
            tokio::fs::remove_dir_all(&dir).await?;
            tracing::info!(%job_id, %finished_at, "removed finished local job");
            removed.push(job_id);
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

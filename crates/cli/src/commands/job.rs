// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay job` - Submit and manage jobs on the configured runner

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand};
use relay_core::{JobId, JobState, JobStatus, SourceRef};
use relay_engine::{AppContext, OrchestrationError};

use super::{duration_arg, parse_key_value};
use crate::color;
use crate::exit_error::{ExitError, JOB_UNSUCCESSFUL, WAIT_TIMEOUT};
use crate::output::{format_or_json, format_time_ago, handle_list, write_table, OutputFormat};

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Submit a job for one source file
    Submit {
        /// Source path (e.g. /transcripts/raw/interview.mp3)
        path: String,

        /// Extra job environment (can be repeated: --env KEY=VALUE)
        #[arg(long = "env", value_parser = parse_key_value)]
        env: Vec<(String, String)>,
    },
    /// Show the current state of a job
    Status {
        id: String,
    },
    /// Cancel a job
    Cancel {
        id: String,
    },
    /// Block until a job reaches a terminal state
    Wait {
        id: String,

        /// Give up after this long (e.g. "30m", "2h")
        #[arg(long, default_value = "1h", value_parser = duration_arg)]
        timeout: Duration,

        /// Time between status polls
        #[arg(long, default_value = "10s", value_parser = duration_arg)]
        poll: Duration,
    },
    /// Show job output
    Logs {
        id: String,

        /// Number of most recent lines
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,
    },
    /// List jobs known to the runner, most recent first
    List {
        /// Filter by state (pending, running, completed, failed, cancelled)
        #[arg(long)]
        state: Option<JobState>,

        /// Maximum number of jobs to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// List jobs that have not finished
    Active {
        /// Maximum number of jobs to inspect
        #[arg(short = 'n', long, default_value = "100")]
        limit: usize,
    },
    /// Delete artifacts of jobs that finished long ago
    Cleanup {
        /// Age in days
        #[arg(long, default_value = "7")]
        days: u64,
    },
}

pub async fn handle(command: JobCommand, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let orchestration = &ctx.orchestration;
    match command {
        JobCommand::Submit { path, env } => {
            let source = SourceRef::from_path(path);
            let job_id = orchestration.submit_job(&source, env.into_iter().collect::<BTreeMap<_, _>>()).await?;
            let result = serde_json::json!({ "job_id": job_id, "path": source.path });
            format_or_json(format, &result, || {
                println!("Submitted {} for {}", color::header(job_id.as_str()), source.path);
            })?;
        }
        JobCommand::Status { id } => {
            let status = orchestration.status(&JobId::from(id)).await?;
            format_or_json(format, &status, || print_status(&status))?;
        }
        JobCommand::Cancel { id } => {
            let job_id = JobId::from(id);
            let cancelled = orchestration.cancel(&job_id).await?;
            let result = serde_json::json!({ "job_id": job_id, "cancelled": cancelled });
            format_or_json(format, &result, || {
                if cancelled {
                    println!("Cancelled {}", job_id);
                } else {
                    println!("Job {} was not running", job_id);
                }
            })?;
        }
        JobCommand::Wait { id, timeout, poll } => {
            let job_id = JobId::from(id);
            let status = match orchestration.wait_for_completion(&job_id, timeout, poll).await {
                Ok(status) => status,
                Err(e @ OrchestrationError::WaitTimeout { .. }) => {
                    return Err(ExitError::new(WAIT_TIMEOUT, e.to_string()).into())
                }
                Err(e) => return Err(e.into()),
            };
            format_or_json(format, &status, || print_status(&status))?;
            if status.state != JobState::Completed {
                return Err(
                    ExitError::new(JOB_UNSUCCESSFUL, format!("job {} {}", job_id, status.state)).into()
                );
            }
        }
        JobCommand::Logs { id, limit } => {
            let lines = orchestration.logs(&JobId::from(id), limit).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&lines)?),
                OutputFormat::Text => {
                    let mut out = std::io::stdout().lock();
                    for line in &lines {
                        writeln!(out, "{}", line)?;
                    }
                }
            }
        }
        JobCommand::List { state, limit } => {
            let jobs = orchestration.list_jobs(state, limit).await?;
            handle_list(format, &jobs, "No jobs", write_jobs)?;
        }
        JobCommand::Active { limit } => {
            // A fresh process has no submission cache, so ask the runner
            let mut jobs = orchestration.list_jobs(None, limit).await?;
            jobs.retain(|job| !job.is_terminal());
            handle_list(format, &jobs, "No active jobs", write_jobs)?;
        }
        JobCommand::Cleanup { days } => {
            let older_than = Duration::from_secs(days.saturating_mul(86_400));
            let removed = orchestration.cleanup(older_than).await?;
            format_or_json(format, &serde_json::json!({ "removed": removed }), || {
                println!("Removed {} finished job(s)", removed.len());
            })?;
        }
    }
    Ok(())
}

fn print_status(status: &JobStatus) {
    let now = chrono::Utc::now();
    println!("{} {}", color::header("Job:"), status.job_id);
    println!("{} {}", color::header("State:"), color::state(status.state));
    println!("{} {}", color::header("Started:"), format_time_ago(status.started_at, now));
    if status.completed_at.is_some() {
        println!("{} {}", color::header("Finished:"), format_time_ago(status.completed_at, now));
    }
    if let Some(error) = &status.error {
        println!("{} {}", color::header("Error:"), error);
    }
    for (key, value) in &status.metadata {
        let value = value.as_str().map_or_else(|| value.to_string(), str::to_string);
        println!("  {} {}", color::muted(&format!("{}:", key)), value);
    }
}

fn write_jobs(jobs: &[JobStatus], out: &mut dyn Write) -> std::io::Result<()> {
    let now = chrono::Utc::now();
    let rows: Vec<Vec<String>> = jobs
        .iter()
        .map(|job| {
            let name = job
                .metadata
                .get("file_name")
                .and_then(|v| v.as_str())
                .unwrap_or("-")
                .to_string();
            vec![
                job.job_id.to_string(),
                color::state(job.state),
                format_time_ago(job.started_at, now),
                name,
            ]
        })
        .collect();
    write_table(out, &["ID", "STATE", "STARTED", "FILE"], &rows)
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay tracking` - Inspect and prune the processed-file ledger

use anyhow::Result;
use clap::{Args, Subcommand};
use relay_engine::AppContext;
use relay_storage::JobRecord;
use serde::Serialize;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, format_time_ago, handle_list, write_table, OutputFormat};

#[derive(Args)]
pub struct TrackingArgs {
    #[command(subcommand)]
    pub command: TrackingCommand,
}

#[derive(Subcommand)]
pub enum TrackingCommand {
    /// List processed files, most recent first
    List {
        /// Maximum number of records to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,

        /// Show all records (no limit)
        #[arg(long, conflicts_with = "limit")]
        no_limit: bool,
    },
    /// Number of processed files
    Count,
    /// Show document metadata
    Info,
    /// Forget one record so the file is processed again
    Remove {
        /// Ledger key (as shown by `tracking list`)
        key: String,
    },
    /// Remove records older than the given age
    Cleanup {
        /// Age in days
        #[arg(long, default_value = "30")]
        days: u32,
    },
    /// Forget every record
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct RecordRow {
    key: String,
    #[serde(flatten)]
    record: JobRecord,
}

pub async fn handle(command: TrackingCommand, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    match command {
        TrackingCommand::List { limit, no_limit } => {
            let records = ctx.tracker.list_processed((!no_limit).then_some(limit)).await?;
            let rows: Vec<RecordRow> =
                records.into_iter().map(|(key, record)| RecordRow { key, record }).collect();
            let now = chrono::Utc::now();
            handle_list(format, &rows, "No processed files", |rows, out| {
                let table: Vec<Vec<String>> = rows
                    .iter()
                    .map(|r| {
                        vec![
                            r.record.file_info.as_ref().map_or_else(|| r.key.clone(), |f| f.path.clone()),
                            r.record.job_id.as_ref().map_or("-", |id| id.as_str()).to_string(),
                            format_time_ago(Some(r.record.processed_at), now),
                            r.key.clone(),
                        ]
                    })
                    .collect();
                write_table(out, &["PATH", "JOB", "PROCESSED", "KEY"], &table)
            })?;
        }
        TrackingCommand::Count => {
            let count = ctx.tracker.processed_count().await?;
            format_or_json(format, &serde_json::json!({ "processed_count": count }), || {
                println!("{}", count);
            })?;
        }
        TrackingCommand::Info => {
            let info = ctx.tracker.info().await?;
            let now = chrono::Utc::now();
            format_or_json(format, &info, || {
                println!("Document:  {} ({})", info.path, info.backend);
                println!("Processed: {}", info.processed_count);
                println!("Updated:   {}", format_time_ago(info.last_updated, now));
                println!("Cleanup:   {}", format_time_ago(info.last_cleanup, now));
                if let Some(reset_at) = info.reset_at {
                    println!("Reset:     {}", format_time_ago(Some(reset_at), now));
                }
            })?;
        }
        TrackingCommand::Remove { key } => {
            let removed = ctx.tracker.remove_record(&key).await?;
            format_or_json(format, &serde_json::json!({ "key": key, "removed": removed }), || {
                if removed {
                    println!("Removed '{}'", key);
                } else {
                    println!("No record '{}'", key);
                }
            })?;
        }
        TrackingCommand::Cleanup { days } => {
            let removed = ctx.tracker.cleanup_older_than(days).await?;
            format_or_json(format, &serde_json::json!({ "days": days, "removed": removed }), || {
                println!("Removed {} record(s) older than {} day(s)", removed, days);
            })?;
        }
        TrackingCommand::Reset { yes } => {
            if !yes {
                return Err(ExitError::not_confirmed("reset the processed-file ledger").into());
            }
            ctx.tracker.reset_all().await?;
            format_or_json(format, &serde_json::json!({ "reset": true }), || {
                println!("Processed-file ledger reset");
            })?;
        }
    }
    Ok(())
}

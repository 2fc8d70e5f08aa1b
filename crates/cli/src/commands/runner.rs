// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay runner` - Runner backend information

use anyhow::Result;
use clap::{Args, Subcommand};
use relay_engine::AppContext;

use crate::color;
use crate::output::{format_or_json, OutputFormat};

#[derive(Args)]
pub struct RunnerArgs {
    #[command(subcommand)]
    pub command: RunnerCommand,
}

#[derive(Subcommand)]
pub enum RunnerCommand {
    /// Show the configured backend, its capabilities and processing stats
    Info,
}

pub async fn handle(command: RunnerCommand, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    match command {
        RunnerCommand::Info => {
            let stats = ctx.pipeline.processing_stats().await?;
            format_or_json(format, &stats, || {
                let runner = &stats.runner;
                let caps = runner.capabilities;
                let enabled: Vec<&str> = [
                    ("submit", caps.submit_job),
                    ("status", caps.get_status),
                    ("cancel", caps.cancel_job),
                    ("list", caps.list_jobs),
                    ("logs", caps.get_logs),
                    ("cleanup", caps.cleanup),
                ]
                .into_iter()
                .filter_map(|(name, on)| on.then_some(name))
                .collect();

                println!("{} {}", color::header("Runner:"), runner.runner_type);
                println!("{} {}", color::header("Capabilities:"), enabled.join(", "));
                println!("{} {}", color::header("Circuit:"), runner.circuit);
                println!("{} {}", color::header("Folder:"), stats.monitored_path);
                println!("{} {}", color::header("Cursor:"), stats.cursor.as_deref().unwrap_or("-"));
                println!("{} {}", color::header("Processed:"), stats.processed_count);
                let formats: Vec<&str> = stats.supported_formats.iter().map(String::as_str).collect();
                println!("{} {}", color::header("Formats:"), formats.join(" "));
            })?;
        }
    }
    Ok(())
}

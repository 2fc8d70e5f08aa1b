// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay: change-driven job orchestration CLI

mod color;
mod commands;
mod exit_error;
mod logging;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use relay_engine::{AppContext, Config};

use commands::{cursor, job, runner, sync, tracking};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "relay", version, about = "Change-driven job orchestration", styles = color::styles())]
struct Cli {
    /// Config file (default: $RELAY_CONFIG, then <state dir>/relay.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'o', long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one change notification and submit jobs for new files
    Sync(sync::SyncArgs),
    /// Change-feed cursors
    Cursor(cursor::CursorArgs),
    /// Processed-file ledger
    Tracking(tracking::TrackingArgs),
    /// Jobs on the configured runner
    Job(job::JobArgs),
    /// Runner backend
    Runner(runner::RunnerArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            let code = exit_error::exit_code(&e);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    // Held until return so the file writer flushes
    let _log_guard = logging::init(&config.logging)?;
    let ctx = AppContext::build(config).await?;
    tracing::debug!(state_dir = %ctx.state_dir.display(), "context built");
    let format = cli.format;

    match cli.command {
        Commands::Sync(args) => sync::handle(args, &ctx).await,
        Commands::Cursor(args) => cursor::handle(args.command, &ctx, format).await,
        Commands::Tracking(args) => tracking::handle(args.command, &ctx, format).await,
        Commands::Job(args) => job::handle(args.command, &ctx, format).await,
        Commands::Runner(args) => runner::handle(args.command, &ctx, format).await,
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

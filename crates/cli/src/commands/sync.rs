// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay sync` - Run one change-processing cycle

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use relay_engine::{AppContext, Notification, SyncSummary};

use crate::exit_error::ExitError;

/// Account recorded for syncs started by hand
const MANUAL_ACCOUNT: &str = "manual";

#[derive(Args)]
pub struct SyncArgs {
    /// Webhook body to process ("-" reads stdin). Without it a sync for a
    /// single manual account is run.
    #[arg(long)]
    pub payload: Option<PathBuf>,
}

pub async fn handle(args: SyncArgs, ctx: &AppContext) -> Result<()> {
    let summary = match &args.payload {
        Some(path) => {
            let body = read_payload(path)?;
            ctx.pipeline.process_payload(&body).await?
        }
        None => ctx.pipeline.process_notification(&Notification::for_account(MANUAL_ACCOUNT)).await?,
    };

    // The summary is the command's output in every format
    println!("{}", serde_json::to_string_pretty(&summary)?);
    check(&summary)
}

fn read_payload(path: &std::path::Path) -> Result<Vec<u8>> {
    if path.as_os_str() == "-" {
        let mut body = Vec::new();
        std::io::Read::read_to_end(&mut std::io::stdin(), &mut body).context("failed to read stdin")?;
        return Ok(body);
    }
    std::fs::read(path).with_context(|| format!("failed to read payload {}", path.display()))
}

fn check(summary: &SyncSummary) -> Result<()> {
    if summary.success {
        Ok(())
    } else {
        Err(ExitError::new(1, format!("sync failed: {}", summary.message)).into())
    }
}

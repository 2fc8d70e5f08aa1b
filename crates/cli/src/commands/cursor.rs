// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `relay cursor` - Inspect and reset change-feed cursors

use anyhow::Result;
use clap::{Args, Subcommand};
use relay_engine::AppContext;
use serde::Serialize;

use crate::exit_error::ExitError;
use crate::output::{format_or_json, format_time_ago, handle_list, write_table, OutputFormat};

#[derive(Args)]
pub struct CursorArgs {
    #[command(subcommand)]
    pub command: CursorCommand,
}

#[derive(Subcommand)]
pub enum CursorCommand {
    /// List stored cursors
    List,
    /// Show document metadata
    Info,
    /// Forget the cursor for one folder (its next sync re-baselines)
    Delete {
        /// Cursor key (the monitored folder path)
        key: String,
    },
    /// Forget every cursor
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct CursorRow {
    key: String,
    token: String,
    updated_at: chrono::DateTime<chrono::Utc>,
}

pub async fn handle(command: CursorCommand, ctx: &AppContext, format: OutputFormat) -> Result<()> {
    match command {
        CursorCommand::List => {
            let rows: Vec<CursorRow> = ctx
                .cursors
                .list_cursors()
                .await?
                .into_iter()
                .map(|(key, entry)| CursorRow { key, token: entry.token, updated_at: entry.updated_at })
                .collect();
            let now = chrono::Utc::now();
            handle_list(format, &rows, "No cursors", |rows, out| {
                let table: Vec<Vec<String>> = rows
                    .iter()
                    .map(|r| vec![r.key.clone(), r.token.clone(), format_time_ago(Some(r.updated_at), now)])
                    .collect();
                write_table(out, &["KEY", "CURSOR", "UPDATED"], &table)
            })?;
        }
        CursorCommand::Info => {
            let info = ctx.cursors.info().await?;
            let now = chrono::Utc::now();
            format_or_json(format, &info, || {
                println!("Document: {} ({})", info.path, info.backend);
                println!("Cursors:  {}", info.cursor_count);
                println!("Updated:  {}", format_time_ago(info.last_updated, now));
                if let Some(reset_at) = info.reset_at {
                    println!("Reset:    {}", format_time_ago(Some(reset_at), now));
                }
            })?;
        }
        CursorCommand::Delete { key } => {
            let deleted = ctx.cursors.delete_cursor(&key).await?;
            let result = serde_json::json!({ "key": key, "deleted": deleted });
            format_or_json(format, &result, || {
                if deleted {
                    println!("Deleted cursor '{}'", key);
                } else {
                    println!("No cursor '{}'", key);
                }
            })?;
        }
        CursorCommand::Reset { yes } => {
            if !yes {
                return Err(ExitError::not_confirmed("reset all cursors").into());
            }
            ctx.cursors.reset_all().await?;
            format_or_json(format, &serde_json::json!({ "reset": true }), || {
                println!("All cursors reset");
            })?;
        }
    }
    Ok(())
}

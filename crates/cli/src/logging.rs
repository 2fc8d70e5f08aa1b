// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup.
//!
//! Logs go to stderr so stdout stays clean for command output. With
//! `logging.file` set, a second non-blocking writer appends to that file;
//! the returned guard must live until exit or buffered lines are lost.

use anyhow::{Context, Result};
use relay_engine::{LogFormat, LoggingConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// RUST_LOG > RELAY_LOG > configured level
pub fn filter_directive(rust_log: Option<String>, relay_log: Option<String>, level: &str) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .or(relay_log)
        .unwrap_or_else(|| level.to_string())
}

pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok(),
        relay_engine::env::log_filter(),
        &config.level,
    );
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter '{}'", directive))?;

    let mut layers: Vec<BoxedLayer> = vec![stderr_layer(config.format)];
    let mut guard = None;
    if let Some(path) = &config.file {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(std::path::Path::new("."));
        let name = path.file_name().with_context(|| format!("log file has no name: {}", path.display()))?;
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        let (writer, file_guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
        layers.push(fmt::layer().json().with_writer(writer).with_ansi(false).boxed());
        guard = Some(file_guard);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .context("failed to install log subscriber")?;
    Ok(guard)
}

fn stderr_layer(format: LogFormat) -> BoxedLayer {
    match format {
        LogFormat::Text => fmt::layer().with_writer(std::io::stderr).with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).with_target(false).boxed(),
    }
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;

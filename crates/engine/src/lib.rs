// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! relay-engine: configuration, job orchestration and the change pipeline

pub mod config;
pub mod context;
pub mod env;
pub mod orchestration;
pub mod pipeline;

pub use config::{Config, ConfigError, LogFormat, LoggingConfig, CONFIG_FILE};
pub use context::{AppContext, ContextError};
pub use orchestration::{
    OrchestrationError, OrchestrationService, OrchestrationSettings, RunnerInfo,
};
pub use pipeline::{
    JobResult, Notification, PipelineError, ProcessingStats, SyncMode, SyncSummary,
    WebhookPipeline,
};

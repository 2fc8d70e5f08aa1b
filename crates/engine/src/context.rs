// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide service wiring.
//!
//! [`AppContext`] is built once from a loaded [`Config`] and handed to
//! whatever drives the services (the CLI, a webhook handler).

use std::path::PathBuf;
use std::sync::Arc;

use relay_adapters::{
    ChangeSource, FsChangeSource, FsStorage, JobRunner, RunnerConfig, RunnerError, RunnerRegistry,
    Storage,
};
use relay_storage::{CursorManager, JobTracker};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::orchestration::{OrchestrationService, OrchestrationSettings};
use crate::pipeline::WebhookPipeline;

#[derive(Debug, Error)]
pub enum ContextError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Runner(#[from] RunnerError),

    #[error("failed to create {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shared services for one process
pub struct AppContext {
    pub config: Config,
    /// Root of the state documents
    pub state_dir: PathBuf,
    pub storage: Arc<dyn Storage>,
    pub cursors: Arc<CursorManager>,
    pub tracker: Arc<JobTracker>,
    pub orchestration: Arc<OrchestrationService>,
    pub pipeline: WebhookPipeline,
}

impl AppContext {
    /// Build with the built-in runner backends only
    pub async fn build(config: Config) -> Result<Self, ContextError> {
        Self::build_with(config, &RunnerRegistry::new()).await
    }

    /// Build, resolving custom runner backends through `registry`
    pub async fn build_with(config: Config, registry: &RunnerRegistry) -> Result<Self, ContextError> {
        // 1. State directory and document storage
        let state_dir = config.state_dir()?;
        create_dir(&state_dir).await?;
        let storage: Arc<dyn Storage> = Arc::new(FsStorage::new(state_dir.clone()));
        let retry = config.orchestration.retry.policy();
        let cursors = Arc::new(
            CursorManager::new(Arc::clone(&storage))
                .with_path(config.state.cursor_file.clone())
                .with_retry(retry.clone()),
        );
        let tracker = Arc::new(
            JobTracker::new(Arc::clone(&storage))
                .with_path(config.state.tracking_file.clone())
                .with_retry(retry),
        );

        // 2. Job runner (relative local work dirs live under the state dir)
        let runner_config = match &config.runner {
            RunnerConfig::Local(local) if local.work_dir.is_relative() => {
                let mut local = local.clone();
                local.work_dir = state_dir.join(&local.work_dir);
                RunnerConfig::Local(local)
            }
            other => other.clone(),
        };
        let runner: Arc<dyn JobRunner> = registry.build(&runner_config).await?;
        let orchestration = Arc::new(OrchestrationService::new(
            runner,
            OrchestrationSettings::from(&config.orchestration),
        ));

        // 3. Change feed and pipeline
        let source_root = config.source_root()?;
        let source: Arc<dyn ChangeSource> = Arc::new(FsChangeSource::new(source_root.clone()));
        let pipeline = WebhookPipeline::new(
            source,
            Arc::clone(&cursors),
            Arc::clone(&tracker),
            Arc::clone(&orchestration),
            config.source.monitored_path.clone(),
            config.supported_formats(),
        );

        tracing::info!(
            state_dir = %state_dir.display(),
            source_root = %source_root.display(),
            runner = %config.runner.kind(),
            "context ready"
        );
        Ok(Self { config, state_dir, storage, cursors, tracker, orchestration, pipeline })
    }
}

async fn create_dir(path: &std::path::Path) -> Result<(), ContextError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| ContextError::Io { path: path.to_path_buf(), source })
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;

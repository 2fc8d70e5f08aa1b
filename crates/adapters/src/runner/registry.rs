// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner selection from configuration.
//!
//! Built-in backends are matched exhaustively; custom backends are looked up
//! by name in a constructor table filled at startup.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use super::batch::{BatchRunner, KubeBatchApi, KubeRunnerConfig};
use super::local::{LocalRunner, LocalRunnerConfig};
use super::{JobRunner, RunnerError};

/// Which execution backend to use, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RunnerConfig {
    Local(LocalRunnerConfig),
    Kubernetes(KubeRunnerConfig),
    Custom {
        name: String,
        #[serde(default)]
        settings: serde_json::Value,
    },
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::Local(LocalRunnerConfig::default())
    }
}

impl RunnerConfig {
    pub fn kind(&self) -> &str {
        match self {
            Self::Local(_) => "local",
            Self::Kubernetes(_) => "kubernetes",
            Self::Custom { name, .. } => name,
        }
    }
}

pub type RunnerConstructor = Arc<
    dyn Fn(serde_json::Value) -> BoxFuture<'static, Result<Arc<dyn JobRunner>, RunnerError>>
        + Send
        + Sync,
>;

#[derive(Clone, Default)]
pub struct RunnerRegistry {
    custom: HashMap<String, RunnerConstructor>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor for `RunnerConfig::Custom { name, .. }`.
    /// A later registration under the same name replaces the earlier one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, ctor: F)
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn JobRunner>, RunnerError>> + Send + 'static,
    {
        let ctor: RunnerConstructor = Arc::new(move |settings| Box::pin(ctor(settings)));
        self.custom.insert(name.into(), ctor);
    }

    /// Names of registered custom backends, sorted.
    pub fn custom_backends(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.custom.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn build(&self, config: &RunnerConfig) -> Result<Arc<dyn JobRunner>, RunnerError> {
        let runner: Arc<dyn JobRunner> = match config {
            RunnerConfig::Local(local) => Arc::new(LocalRunner::new(local.clone())?),
            RunnerConfig::Kubernetes(kube) => {
                Arc::new(BatchRunner::new(KubeBatchApi::connect(kube.clone()).await?))
            }
            RunnerConfig::Custom { name, settings } => {
                let ctor = self.custom.get(name).ok_or_else(|| {
                    RunnerError::Config(format!("unknown runner backend: {}", name))
                })?;
                ctor(settings.clone()).await?
            }
        };
        tracing::info!(runner = %runner.runner_type(), "job runner ready");
        Ok(runner)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

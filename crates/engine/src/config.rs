// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relay configuration.
//!
//! Loaded from TOML (`--config`, `RELAY_CONFIG`, or `<state_dir>/relay.toml`),
//! then overridden from the environment and validated. Every field has a
//! default, so an empty file is a valid configuration.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use relay_adapters::{KubeRunnerConfig, LocalRunnerConfig, RunnerConfig};
use relay_core::ResourceRequirements;
use relay_resilience::{BackoffStrategy, BreakerConfig, RetryPolicy};
use relay_storage::{DEFAULT_CURSOR_PATH, DEFAULT_TRACKING_PATH};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::env;

/// File name looked up in the state directory when no config path is given
pub const CONFIG_FILE: &str = "relay.toml";

pub const DEFAULT_SUPPORTED_FORMATS: [&str; 17] = [
    ".mp3", ".mp4", ".mpeg", ".mpga", ".m4a", ".wav", ".webm", ".aac", ".oga", ".ogg", ".flac",
    ".mov", ".avi", ".mkv", ".wmv", ".flv", ".3gp",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {field}: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("could not determine state directory (set RELAY_STATE_DIR)")]
    NoStateDir,
}

fn invalid(field: &'static str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field, message: message.into() }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub source: SourceConfig,
    pub state: StateConfig,
    pub runner: RunnerConfig,
    pub orchestration: OrchestrationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Root of the watched directory tree (default: `<state_dir>/source`)
    pub root: Option<PathBuf>,
    /// Source key whose changes trigger jobs
    pub monitored_path: String,
    /// Extensions (with leading dot) that trigger jobs; compared case-insensitively
    pub supported_formats: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: None,
            monitored_path: "/transcripts/raw".to_string(),
            supported_formats: DEFAULT_SUPPORTED_FORMATS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Where the state documents live (default: the state directory)
    pub dir: Option<PathBuf>,
    pub cursor_file: String,
    pub tracking_file: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            dir: None,
            cursor_file: DEFAULT_CURSOR_PATH.to_string(),
            tracking_file: DEFAULT_TRACKING_PATH.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub job_type: String,
    /// Bound on concurrent submissions in a batch
    pub max_concurrent: usize,
    /// Limit for each individual runner call
    pub call_timeout_secs: u64,
    pub resources: ResourceRequirements,
    pub retry: RetryConfig,
    pub breaker: BreakerSettings,
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            job_type: "transcription".to_string(),
            max_concurrent: 5,
            call_timeout_secs: 30,
            resources: ResourceRequirements::default(),
            retry: RetryConfig::default(),
            breaker: BreakerSettings::default(),
        }
    }
}

impl OrchestrationConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: BackoffStrategy,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            strategy: policy.strategy,
            multiplier: policy.multiplier,
            jitter: policy.jitter,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .strategy(self.strategy)
            .multiplier(self.multiplier)
            .jitter(self.jitter)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub half_open_successes: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let config = BreakerConfig::default();
        Self {
            failure_threshold: config.failure_threshold,
            recovery_timeout_secs: config.recovery_timeout.as_secs(),
            half_open_successes: config.half_open_successes,
        }
    }
}

impl BreakerSettings {
    pub fn config(&self) -> BreakerConfig {
        BreakerConfig::default()
            .failure_threshold(self.failure_threshold)
            .recovery_timeout(Duration::from_secs(self.recovery_timeout_secs))
            .half_open_successes(self.half_open_successes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; RUST_LOG and RELAY_LOG take precedence
    pub level: String,
    pub format: LogFormat,
    /// Also write logs to this file
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Text, file: None }
    }
}

impl Config {
    /// Load, apply environment overrides and validate.
    ///
    /// An explicit path (or `RELAY_CONFIG`) must exist. Without one, the
    /// state directory's `relay.toml` is used when present, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit.map(Path::to_path_buf).or_else(env::config_path);
        let mut config = match path {
            Some(path) => Self::from_file(&path)?,
            None => match env::state_dir().ok().map(|d| d.join(CONFIG_FILE)).filter(|p| p.is_file())
            {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let config = Self::from_toml(&text)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// RELAY_RUNNER switches backend (keeping the configured one when it
    /// already matches); RELAY_SOURCE_ROOT replaces the watched root.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(kind) = env::runner_kind() {
            if kind != self.runner.kind() {
                self.runner = match kind.as_str() {
                    "local" => RunnerConfig::Local(LocalRunnerConfig::default()),
                    "kubernetes" => RunnerConfig::Kubernetes(KubeRunnerConfig::default()),
                    other => {
                        return Err(invalid("RELAY_RUNNER", format!("unknown runner '{}'", other)))
                    }
                };
            }
        }
        if let Some(root) = env::source_root() {
            self.source.root = Some(root);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.source.monitored_path.starts_with('/') {
            return Err(invalid("source.monitored_path", "must start with '/'"));
        }
        if self.source.supported_formats.is_empty() {
            return Err(invalid("source.supported_formats", "at least one format is required"));
        }
        if let Some(bad) =
            self.source.supported_formats.iter().find(|f| !f.starts_with('.') || f.len() < 2)
        {
            return Err(invalid("source.supported_formats", format!("'{}' is not an extension", bad)));
        }

        if self.state.cursor_file.trim().is_empty() || self.state.tracking_file.trim().is_empty() {
            return Err(invalid("state", "document paths must not be empty"));
        }
        if self.state.cursor_file == self.state.tracking_file {
            return Err(invalid("state", "cursor and tracking documents must differ"));
        }

        let orchestration = &self.orchestration;
        if orchestration.job_type.trim().is_empty() {
            return Err(invalid("orchestration.job_type", "must not be empty"));
        }
        if orchestration.max_concurrent == 0 {
            return Err(invalid("orchestration.max_concurrent", "must be at least 1"));
        }
        if orchestration.call_timeout_secs == 0 {
            return Err(invalid("orchestration.call_timeout_secs", "must be at least 1"));
        }
        if orchestration.resources.timeout_seconds == 0 {
            return Err(invalid("orchestration.resources.timeout_seconds", "must be at least 1"));
        }
        let retry = &orchestration.retry;
        if retry.max_attempts == 0 {
            return Err(invalid("orchestration.retry.max_attempts", "must be at least 1"));
        }
        if !(retry.multiplier.is_finite() && retry.multiplier >= 1.0) {
            return Err(invalid("orchestration.retry.multiplier", "must be a finite value >= 1.0"));
        }
        if retry.max_delay_ms < retry.base_delay_ms {
            return Err(invalid("orchestration.retry.max_delay_ms", "must be >= base_delay_ms"));
        }
        let breaker = &orchestration.breaker;
        if breaker.failure_threshold == 0 || breaker.half_open_successes == 0 {
            return Err(invalid("orchestration.breaker", "thresholds must be at least 1"));
        }

        match &self.runner {
            RunnerConfig::Local(local) => {
                if local.command.first().map_or(true, |c| c.trim().is_empty()) {
                    return Err(invalid("runner.command", "must name a program"));
                }
            }
            RunnerConfig::Kubernetes(kube) => {
                if kube.image.trim().is_empty() {
                    return Err(invalid("runner.image", "must not be empty"));
                }
                if kube.namespace.trim().is_empty() {
                    return Err(invalid("runner.namespace", "must not be empty"));
                }
            }
            RunnerConfig::Custom { name, .. } => {
                if name.trim().is_empty() {
                    return Err(invalid("runner.name", "must not be empty"));
                }
            }
        }
        Ok(())
    }

    pub fn state_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.state.dir {
            Some(dir) => Ok(dir.clone()),
            None => env::state_dir(),
        }
    }

    pub fn source_root(&self) -> Result<PathBuf, ConfigError> {
        match &self.source.root {
            Some(root) => Ok(root.clone()),
            None => Ok(self.state_dir()?.join("source")),
        }
    }

    /// Lowercased supported extensions
    pub fn supported_formats(&self) -> BTreeSet<String> {
        self.source.supported_formats.iter().map(|f| f.to_ascii_lowercase()).collect()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

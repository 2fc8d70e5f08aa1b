//! Shared fixtures for workspace specs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub use relay_adapters::{FakeRunner, JobRunner, RunnerConfig, RunnerRegistry};
pub use relay_core::{DedupKey, JobId, JobState, SourceRef};
pub use relay_engine::{AppContext, Config, Notification, SyncMode, SyncSummary};
use tempfile::TempDir;

pub const FOLDER: &str = "/transcripts/raw";

/// Arbitrary fixed epoch so modification times are deterministic
const BASE_SECS: u64 = 1_700_000_000;

/// A state directory, an inbox, and a fake runner that outlives contexts.
pub struct Project {
    dir: TempDir,
    pub runner: FakeRunner,
}

impl Project {
    /// Empty monitored folder under a fresh inbox
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("inbox").join(FOLDER.trim_start_matches('/')))
            .unwrap();
        Self { dir, runner: FakeRunner::new() }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.state.dir = Some(self.state_dir());
        config.source.root = Some(self.dir.path().join("inbox"));
        config.runner =
            RunnerConfig::Custom { name: "fake".to_string(), settings: serde_json::Value::Null };
        config.orchestration.retry.max_attempts = 1;
        config
    }

    /// Build a context the way a fresh process would.
    pub async fn context(&self) -> AppContext {
        let mut registry = RunnerRegistry::new();
        let runner = self.runner.clone();
        registry.register("fake", move |_settings| {
            let runner = runner.clone();
            async move { Ok(Arc::new(runner) as Arc<dyn JobRunner>) }
        });
        AppContext::build_with(self.config(), &registry).await.unwrap()
    }

    /// Write `relative` (under the monitored folder) with a modification
    /// time `offset_secs` after the fixed base.
    pub fn drop_file(&self, relative: &str, offset_secs: u64) -> String {
        let path = self.inbox_path(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let file = std::fs::File::create(&path).unwrap();
        file.set_modified(mtime(offset_secs)).unwrap();
        format!("{}/{}", FOLDER, relative)
    }

    /// Bump the modification time of an existing file. Waits first so the
    /// change lands on a later millisecond than the previous cycle.
    pub fn touch(&self, relative: &str, offset_secs: u64) {
        std::thread::sleep(Duration::from_millis(5));
        let file = std::fs::OpenOptions::new().write(true).open(self.inbox_path(relative)).unwrap();
        file.set_modified(mtime(offset_secs)).unwrap();
    }

    pub fn read_state_json(&self, name: &str) -> serde_json::Value {
        let bytes = std::fs::read(self.state_dir().join(name)).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn inbox_path(&self, relative: &str) -> PathBuf {
        self.dir.path().join("inbox").join(FOLDER.trim_start_matches('/')).join(relative)
    }
}

fn mtime(offset_secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(BASE_SECS + offset_secs)
}

pub async fn sync(ctx: &AppContext) -> SyncSummary {
    ctx.pipeline.process_notification(&Notification::for_account("dbid:spec")).await.unwrap()
}

/// Source paths the runner was asked to process, in submission order
pub fn submitted_paths(runner: &FakeRunner) -> Vec<String> {
    runner
        .submitted()
        .iter()
        .filter_map(|spec| spec.input_data.get("file_path").and_then(|v| v.as_str()).map(String::from))
        .collect()
}

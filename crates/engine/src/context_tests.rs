// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::pipeline::{Notification, SyncMode};
use relay_adapters::{FakeRunner, LocalRunnerConfig};
use tempfile::tempdir;

fn config_in(dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.state.dir = Some(dir.join("state"));
    config.source.root = Some(dir.join("inbox"));
    config
}

#[tokio::test]
async fn builds_local_context_under_state_dir() {
    let dir = tempdir().unwrap();
    let ctx = AppContext::build(config_in(dir.path())).await.unwrap();

    assert_eq!(ctx.state_dir, dir.path().join("state"));
    assert!(ctx.state_dir.is_dir());
    assert_eq!(ctx.storage.name(), "fs");
    assert_eq!(ctx.orchestration.runner_info().runner_type, "local");
    assert_eq!(ctx.pipeline.monitored_path(), "/transcripts/raw");

    let info = ctx.cursors.info().await.unwrap();
    assert_eq!(info.path, "webhook_cursors.json");
    assert_eq!(info.cursor_count, 0);
}

#[tokio::test]
async fn nested_state_dir_is_created() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.state.dir = Some(dir.path().join("a/b/state"));

    let ctx = AppContext::build(config).await.unwrap();

    assert!(dir.path().join("a/b/state").is_dir());
    assert_eq!(ctx.state_dir, dir.path().join("a/b/state"));
}

#[tokio::test]
async fn state_dir_blocked_by_file_is_io_error() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("blocker"), b"").unwrap();
    let mut config = config_in(dir.path());
    config.state.dir = Some(dir.path().join("blocker/state"));

    let err = AppContext::build(config).await.err().unwrap();

    match err {
        ContextError::Io { path, .. } => assert_eq!(path, dir.path().join("blocker/state")),
        other => panic!("expected io error, got {:?}", other),
    }
}

#[tokio::test]
async fn document_paths_come_from_config() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.state.tracking_file = "ledger/processed.json".to_string();
    let ctx = AppContext::build(config).await.unwrap();

    ctx.tracker.mark_processed("k1", None, None).await.unwrap();

    assert!(dir.path().join("state/ledger/processed.json").is_file());
}

#[tokio::test]
async fn custom_runner_resolves_through_registry() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.runner = RunnerConfig::Custom { name: "fake".to_string(), settings: serde_json::Value::Null };
    let mut registry = RunnerRegistry::new();
    registry.register("fake", |_settings| async {
        Ok(Arc::new(FakeRunner::new()) as Arc<dyn JobRunner>)
    });

    let ctx = AppContext::build_with(config.clone(), &registry).await.unwrap();
    assert_eq!(ctx.orchestration.runner_info().runner_type, "fake");

    let err = AppContext::build(config).await.err().unwrap();
    assert!(matches!(err, ContextError::Runner(RunnerError::Config(_))));
}

#[tokio::test]
async fn absolute_local_work_dir_is_kept() {
    let dir = tempdir().unwrap();
    let mut config = config_in(dir.path());
    let work_dir = dir.path().join("jobs");
    config.runner =
        RunnerConfig::Local(LocalRunnerConfig { work_dir: work_dir.clone(), ..LocalRunnerConfig::default() });

    let ctx = AppContext::build(config.clone()).await.unwrap();

    // The stored config is left as written
    assert_eq!(ctx.config, config);
}

#[tokio::test]
async fn first_sync_against_empty_inbox_stores_baseline() {
    let dir = tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("inbox/transcripts/raw")).unwrap();
    let ctx = AppContext::build(config_in(dir.path())).await.unwrap();

    let summary = ctx.pipeline.process_notification(&Notification::for_account("a")).await.unwrap();

    assert!(summary.success);
    assert_eq!(summary.sync_mode, SyncMode::Baseline);
    let cursor = ctx.cursors.get_cursor("/transcripts/raw").await.unwrap().unwrap();
    assert!(cursor.starts_with("fs1:"));
}

#[tokio::test]
async fn missing_inbox_folder_is_reported_in_summary() {
    let dir = tempdir().unwrap();
    let ctx = AppContext::build(config_in(dir.path())).await.unwrap();

    let summary = ctx.pipeline.process_notification(&Notification::for_account("a")).await.unwrap();

    assert!(!summary.success);
    assert_eq!(ctx.cursors.get_cursor("/transcripts/raw").await.unwrap(), None);
}

//! State that survives between processes

use crate::prelude::*;

#[tokio::test]
async fn cursor_and_ledger_survive_a_new_context() {
    let project = Project::new();
    let first = project.context().await;
    sync(&first).await;
    project.drop_file("a.mp3", 10);
    sync(&first).await;
    let cursor = first.cursors.get_cursor(FOLDER).await.unwrap();
    drop(first);

    let second = project.context().await;
    assert_eq!(second.cursors.get_cursor(FOLDER).await.unwrap(), cursor);
    assert_eq!(second.tracker.processed_count().await.unwrap(), 1);

    let summary = sync(&second).await;
    assert_eq!(summary.sync_mode, SyncMode::Incremental);
    assert_eq!(summary.jobs_triggered, 0);
    assert_eq!(project.runner.submitted().len(), 1);
}

#[tokio::test]
async fn state_documents_are_plain_json_files() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;
    let path = project.drop_file("a.mp3", 10);
    sync(&ctx).await;

    let cursors = project.read_state_json("webhook_cursors.json");
    assert!(cursors[FOLDER]["token"].as_str().unwrap().starts_with("fs1:"));
    assert!(cursors["_last_updated"].is_string());

    let ledger = project.read_state_json("processed_jobs.json");
    let key = DedupKey::for_path(&path);
    assert_eq!(ledger[key.as_str()]["job_id"], "fake-1");
    assert_eq!(ledger[key.as_str()]["file_info"]["path"], path.as_str());
}

#[tokio::test]
async fn reset_state_makes_the_next_cycle_a_baseline() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;
    project.drop_file("a.mp3", 10);
    sync(&ctx).await;

    ctx.pipeline.reset_processing_state().await.unwrap();
    let stats = ctx.pipeline.processing_stats().await.unwrap();
    assert_eq!(stats.processed_count, 0);
    assert_eq!(stats.cursor, None);

    project.drop_file("b.mp3", 20);
    let summary = sync(&ctx).await;
    assert_eq!(summary.sync_mode, SyncMode::Baseline);
    assert_eq!(project.runner.submitted().len(), 1);
}

#[tokio::test]
async fn stats_report_runner_and_folder() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;

    let stats = ctx.pipeline.processing_stats().await.unwrap();

    assert_eq!(stats.monitored_path, FOLDER);
    assert_eq!(stats.runner.runner_type, "fake");
    assert!(stats.supported_formats.contains(".mp3"));
    assert!(stats.cursor.is_some());
}

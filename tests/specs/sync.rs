//! Sync cycles over a real inbox directory

use crate::prelude::*;

#[tokio::test]
async fn first_sync_skips_existing_files_and_later_files_trigger_jobs() {
    let project = Project::new();
    project.drop_file("backlog.mp3", 10);
    let ctx = project.context().await;

    let first = sync(&ctx).await;
    assert_eq!(first.sync_mode, SyncMode::Baseline);
    assert_eq!(first.jobs_triggered, 0);
    assert!(project.runner.submitted().is_empty());

    let path = project.drop_file("interview.mp3", 20);
    project.drop_file("notes.txt", 21);
    let second = sync(&ctx).await;

    assert!(second.success);
    assert_eq!(second.sync_mode, SyncMode::Incremental);
    assert_eq!(second.files_observed, 1);
    assert_eq!(second.jobs_triggered, 1);
    assert_eq!(second.message, "Processed 1 files, triggered 1 jobs");
    assert_eq!(submitted_paths(&project.runner), vec![path.clone()]);
    assert!(ctx.tracker.is_processed(DedupKey::for_path(&path).as_str()).await.unwrap());
}

#[tokio::test]
async fn replayed_notification_finds_nothing_new() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;
    project.drop_file("a.mp3", 10);
    sync(&ctx).await;

    let replay = sync(&ctx).await;

    assert!(replay.success);
    assert_eq!(replay.sync_mode, SyncMode::Incremental);
    assert_eq!(replay.message, "No new changes found");
    assert_eq!(project.runner.submitted().len(), 1);
}

#[tokio::test]
async fn modified_file_is_not_processed_twice() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;
    project.drop_file("a.wav", 10);
    sync(&ctx).await;

    project.touch("a.wav", 30);
    let summary = sync(&ctx).await;

    assert_eq!(summary.files_observed, 1);
    assert_eq!(summary.files_skipped_already_processed, 1);
    assert_eq!(summary.jobs_triggered, 0);
    assert_eq!(summary.message, "All files already processed");
    assert_eq!(project.runner.submitted().len(), 1);
}

#[tokio::test]
async fn files_in_nested_folders_are_processed() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;

    let nested = project.drop_file("2026/october/call.M4A", 10);
    let summary = sync(&ctx).await;

    assert_eq!(summary.jobs_triggered, 1);
    assert_eq!(summary.job_results[0].path, nested);
    assert_eq!(summary.job_results[0].file_name, "call.M4A");
}

#[tokio::test]
async fn unreadable_cursor_triggers_a_new_baseline() {
    let project = Project::new();
    let ctx = project.context().await;
    ctx.cursors.set_cursor(FOLDER, "not-a-cursor").await.unwrap();
    project.drop_file("skipped.mp3", 10);

    let summary = sync(&ctx).await;

    assert!(summary.success);
    assert_eq!(summary.sync_mode, SyncMode::Rebaselined);
    assert!(project.runner.submitted().is_empty());
    let cursor = ctx.cursors.get_cursor(FOLDER).await.unwrap().unwrap();
    assert!(cursor.starts_with("fs1:"), "cursor: {}", cursor);
}

#[tokio::test]
async fn rejected_submission_is_reported_and_left_unprocessed() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;
    let good = project.drop_file("good.mp3", 10);
    let bad = project.drop_file("bad.mp3", 11);
    project.runner.fail_submits_for(&bad);

    let summary = sync(&ctx).await;

    assert!(summary.success);
    assert_eq!(summary.files_observed, 2);
    assert_eq!(summary.jobs_triggered, 1);
    let failed = summary.job_results.iter().find(|r| r.path == bad).unwrap();
    assert!(!failed.success);
    assert!(failed.error.is_some());
    assert!(failed.job_id.is_none());
    assert!(ctx.tracker.is_processed(DedupKey::for_path(&good).as_str()).await.unwrap());
    assert!(!ctx.tracker.is_processed(DedupKey::for_path(&bad).as_str()).await.unwrap());
}

#[tokio::test]
async fn webhook_body_without_accounts_touches_nothing() {
    let project = Project::new();
    let ctx = project.context().await;

    let summary = ctx.pipeline.process_payload(br#"{"list_folder": {"accounts": []}}"#).await.unwrap();

    assert_eq!(summary.sync_mode, SyncMode::Noop);
    assert_eq!(ctx.cursors.get_cursor(FOLDER).await.unwrap(), None);
}

#[tokio::test]
async fn webhook_body_with_accounts_runs_a_cycle() {
    let project = Project::new();
    let ctx = project.context().await;

    let summary =
        ctx.pipeline.process_payload(br#"{"list_folder": {"accounts": ["dbid:AAA"]}}"#).await.unwrap();

    assert_eq!(summary.sync_mode, SyncMode::Baseline);
    assert!(ctx.cursors.get_cursor(FOLDER).await.unwrap().is_some());
}

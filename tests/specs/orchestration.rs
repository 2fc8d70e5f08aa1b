//! Job orchestration through the configured runner

use std::collections::BTreeMap;
use std::time::Duration;

use crate::prelude::*;

#[tokio::test]
async fn batch_submission_respects_concurrency_bound() {
    let project = Project::new();
    project.runner.set_submit_delay(Duration::from_millis(20));
    let ctx = project.context().await;
    let sources: Vec<SourceRef> =
        (0..6).map(|i| SourceRef::from_path(format!("{}/take{}.mp3", FOLDER, i))).collect();

    let ids = ctx.orchestration.submit_batch(&sources, 2).await;

    assert_eq!(ids.len(), 6);
    assert!(project.runner.max_in_flight() <= 2);
    assert_eq!(ctx.orchestration.list_active().await.len(), 6);
}

#[tokio::test]
async fn submitted_job_can_be_waited_on() {
    let project = Project::new();
    let ctx = project.context().await;
    let job_id = ctx
        .orchestration
        .submit_job(&SourceRef::from_path(format!("{}/a.mp3", FOLDER)), BTreeMap::new())
        .await
        .unwrap();
    project.runner.script_states(&job_id, [JobState::Running, JobState::Completed]);

    let status = ctx
        .orchestration
        .wait_for_completion(&job_id, Duration::from_secs(5), Duration::from_millis(1))
        .await
        .unwrap();

    assert_eq!(status.state, JobState::Completed);
    assert!(ctx.orchestration.list_active().await.is_empty());
}

#[tokio::test]
async fn jobs_from_a_sync_carry_source_metadata() {
    let project = Project::new();
    let ctx = project.context().await;
    sync(&ctx).await;
    let path = project.drop_file("a.mp3", 10);
    let summary = sync(&ctx).await;
    let job_id = summary.job_results[0].job_id.clone().unwrap();

    let spec = &project.runner.submitted()[0];
    assert_eq!(spec.environment["RELAY_SOURCE_PATH"], path);
    assert_eq!(spec.environment["RELAY_SOURCE_NAME"], "a.mp3");
    assert_eq!(spec.environment["RELAY_SINGLE_ITEM"], "true");

    let status = ctx.orchestration.status(&job_id).await.unwrap();
    assert_eq!(status.metadata["file_path"], path.as_str());
}

#[tokio::test]
async fn cancelled_job_leaves_the_active_set() {
    let project = Project::new();
    let ctx = project.context().await;
    let job_id = ctx
        .orchestration
        .submit_job(&SourceRef::from_path(format!("{}/a.mp3", FOLDER)), BTreeMap::new())
        .await
        .unwrap();

    assert!(ctx.orchestration.cancel(&job_id).await.unwrap());
    assert!(ctx.orchestration.list_active().await.is_empty());
    let cancelled = ctx.orchestration.list_jobs(Some(JobState::Cancelled), 10).await.unwrap();
    assert_eq!(cancelled.iter().map(|j| j.job_id.clone()).collect::<Vec<JobId>>(), vec![job_id]);
}

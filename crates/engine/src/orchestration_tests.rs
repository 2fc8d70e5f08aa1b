// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_adapters::{FakeRunner, RunnerCall};
use relay_core::FakeClock;

fn settings() -> OrchestrationSettings {
    OrchestrationSettings::default().retry(RetryPolicy::no_retry())
}

fn service(runner: &FakeRunner) -> OrchestrationService<FakeClock> {
    OrchestrationService::with_clock(Arc::new(runner.clone()), settings(), FakeClock::new())
}

fn source(name: &str) -> SourceRef {
    SourceRef::new(format!("/transcripts/raw/{}", name), name)
}

#[tokio::test]
async fn submit_builds_single_item_job() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let extra = BTreeMap::from([
        ("LANGUAGE".to_string(), "de".to_string()),
        (ENV_SOURCE_NAME.to_string(), "spoofed".to_string()),
    ]);

    let job_id = svc.submit_job(&source("a.mp3"), extra).await.unwrap();

    let spec = &runner.submitted()[0];
    assert_eq!(spec.job_type, "transcription");
    assert_eq!(spec.input_data["file_path"], "/transcripts/raw/a.mp3");
    assert_eq!(spec.input_data["file_name"], "a.mp3");
    assert_eq!(spec.environment[ENV_SINGLE_ITEM], "true");
    assert_eq!(spec.environment[ENV_SOURCE_PATH], "/transcripts/raw/a.mp3");
    assert_eq!(spec.environment[ENV_SOURCE_NAME], "a.mp3");
    assert_eq!(spec.environment["LANGUAGE"], "de");
    assert_eq!(spec.metadata["file_name"], "a.mp3");
    assert!(spec.metadata.contains_key("submitted_at"));

    assert_eq!(svc.runner_info().active_jobs, 1);
    assert_eq!(job_id, "fake-1");
}

#[tokio::test]
async fn submit_failure_names_the_path_and_is_not_retried() {
    let runner = FakeRunner::new();
    runner.fail_submits_for("bad.mp3");
    let svc = OrchestrationService::with_clock(
        Arc::new(runner.clone()),
        OrchestrationSettings::default(),
        FakeClock::new(),
    );

    let err = svc.submit_job(&source("bad.mp3"), BTreeMap::new()).await.unwrap_err();

    assert!(matches!(err, OrchestrationError::Submit { ref path, .. } if path == "/transcripts/raw/bad.mp3"));
    assert_eq!(runner.submitted().len(), 1);
    assert_eq!(svc.runner_info().active_jobs, 0);
}

#[tokio::test(start_paused = true)]
async fn batch_bounds_concurrency_and_skips_failures() {
    let runner = FakeRunner::new();
    runner.set_submit_delay(Duration::from_millis(100));
    runner.fail_submits_for("c.mp3");
    let svc = service(&runner);
    let sources: Vec<_> = ["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3"].map(source).to_vec();

    let ids = svc.submit_batch(&sources, 2).await;

    assert_eq!(ids.len(), 4);
    assert_eq!(runner.submitted().len(), 5);
    assert!(runner.max_in_flight() <= 2, "in flight: {}", runner.max_in_flight());
    assert_eq!(runner.max_in_flight(), 2);
}

#[tokio::test]
async fn batch_with_zero_bound_still_submits() {
    let runner = FakeRunner::new();
    let svc = service(&runner);

    let ids = svc.submit_batch(&[source("a.mp3"), source("b.mp3")], 0).await;

    assert_eq!(ids.len(), 2);
    assert_eq!(runner.max_in_flight(), 1);
}

#[tokio::test]
async fn status_refreshes_cache_and_keeps_submit_metadata() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    runner.set_state(&job_id, JobState::Running);

    let status = svc.status(&job_id).await.unwrap();

    assert_eq!(status.state, JobState::Running);
    assert_eq!(status.metadata["file_path"], "/transcripts/raw/a.mp3");
}

#[tokio::test(start_paused = true)]
async fn transient_status_failures_are_retried() {
    let runner = FakeRunner::new();
    let svc = OrchestrationService::with_clock(
        Arc::new(runner.clone()),
        OrchestrationSettings::default().retry(RetryPolicy::default().jitter(false)),
        FakeClock::new(),
    );
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    runner.fail_next_statuses(2);

    let status = svc.status(&job_id).await.unwrap();

    assert_eq!(status.state, JobState::Pending);
    assert_eq!(runner.status_calls(), 3);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let runner = FakeRunner::new();
    let svc = service(&runner);

    let err = svc.status(&JobId::from("nope")).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Runner(RunnerError::NotFound(_))));
    assert_eq!(svc.runner_info().circuit, CircuitState::Closed);
}

#[tokio::test]
async fn breaker_opens_after_repeated_unavailability_then_recovers() {
    let runner = FakeRunner::new();
    let clock = FakeClock::new();
    let svc = OrchestrationService::with_clock(
        Arc::new(runner.clone()),
        settings().breaker(
            BreakerConfig::default()
                .failure_threshold(2)
                .recovery_timeout(Duration::from_secs(30))
                .half_open_successes(1),
        ),
        clock.clone(),
    );
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    runner.fail_next_statuses(2);

    assert!(svc.status(&job_id).await.is_err());
    assert!(svc.status(&job_id).await.is_err());
    assert_eq!(svc.runner_info().circuit, CircuitState::Open);

    let err = svc.status(&job_id).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Runner(RunnerError::CircuitOpen(_))));
    assert_eq!(runner.status_calls(), 2);

    clock.advance(Duration::from_secs(31));
    assert!(svc.status(&job_id).await.is_ok());
    assert_eq!(svc.runner_info().circuit, CircuitState::Closed);
}

#[tokio::test]
async fn list_active_evicts_terminal_jobs() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let done = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    let running = svc.submit_job(&source("b.mp3"), BTreeMap::new()).await.unwrap();
    runner.set_state(&done, JobState::Completed);
    runner.set_state(&running, JobState::Running);

    let active = svc.list_active().await;

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].job_id, running);
    assert_eq!(svc.runner_info().active_jobs, 1);
}

#[tokio::test]
async fn list_active_falls_back_to_cache_on_refresh_failure() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    runner.fail_next_statuses(1);

    let active = svc.list_active().await;

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].job_id, job_id);
    assert_eq!(active[0].state, JobState::Pending);
}

#[tokio::test]
async fn list_jobs_passes_filter_through() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let first = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    svc.submit_job(&source("b.mp3"), BTreeMap::new()).await.unwrap();
    runner.set_state(&first, JobState::Failed);

    let failed = svc.list_jobs(Some(JobState::Failed), 10).await.unwrap();

    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].job_id, first);
    assert!(runner.calls().contains(&RunnerCall::List { state: Some(JobState::Failed), limit: 10 }));
}

#[tokio::test]
async fn cancel_marks_cached_job() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();

    assert!(svc.cancel(&job_id).await.unwrap());
    assert!(!svc.cancel(&job_id).await.unwrap());

    // Cancelled jobs are terminal and drop out of the active set
    assert!(svc.list_active().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn wait_returns_terminal_status() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    runner.script_states(&job_id, [JobState::Pending, JobState::Running, JobState::Completed]);

    let status = svc
        .wait_for_completion(&job_id, Duration::from_secs(60), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(status.state, JobState::Completed);
    assert_eq!(runner.status_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn wait_times_out() {
    let runner = FakeRunner::new();
    let svc = service(&runner);
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();

    let err = svc
        .wait_for_completion(&job_id, Duration::from_secs(10), Duration::from_secs(3))
        .await
        .unwrap_err();

    match err {
        OrchestrationError::WaitTimeout { job_id: id, waited } => {
            assert_eq!(id, job_id);
            assert!(waited >= Duration::from_secs(10));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[tokio::test]
async fn logs_when_supported() {
    let runner = FakeRunner::new().with_logs();
    let svc = service(&runner);
    let job_id = svc.submit_job(&source("a.mp3"), BTreeMap::new()).await.unwrap();
    runner.set_logs(&job_id, vec!["one".into(), "two".into(), "three".into()]);

    assert_eq!(svc.logs(&job_id, 2).await.unwrap(), vec!["two", "three"]);
    assert!(svc.runner_info().capabilities.get_logs);
}

#[tokio::test]
async fn logs_without_capability_are_empty() {
    let runner = FakeRunner::new();
    let svc = service(&runner);

    assert!(svc.logs(&JobId::from("fake-1"), 10).await.unwrap().is_empty());
    assert!(!svc.runner_info().capabilities.get_logs);
}

#[tokio::test]
async fn cleanup_without_capability_is_unsupported() {
    let runner = FakeRunner::new();
    let svc = service(&runner);

    let err = svc.cleanup(Duration::from_secs(60)).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::Unsupported { operation: "cleanup", .. }));
}

#[test]
fn runner_info_serializes() {
    let svc = service(&FakeRunner::new());
    let json = serde_json::to_value(svc.runner_info()).unwrap();

    assert_eq!(json["runner_type"], "fake");
    assert_eq!(json["circuit"], "closed");
    assert_eq!(json["capabilities"]["submit_job"], true);
}

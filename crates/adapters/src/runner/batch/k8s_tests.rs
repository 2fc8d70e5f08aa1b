// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use k8s_openapi::api::batch::v1::{JobCondition, JobStatus as K8sJobStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use kube::error::ErrorResponse;

fn job(conditions: Vec<(&str, &str, Option<&str>)>, active: Option<i32>) -> Job {
    Job {
        metadata: ObjectMeta { name: Some("relay-job-1".to_string()), ..Default::default() },
        status: Some(K8sJobStatus {
            active,
            conditions: Some(
                conditions
                    .into_iter()
                    .map(|(type_, status, message)| JobCondition {
                        type_: type_.to_string(),
                        status: status.to_string(),
                        message: message.map(str::to_string),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[test]
fn complete_condition_becomes_completed_true() {
    let execution = job_to_execution(&job(vec![("Complete", "True", None)], None));
    assert_eq!(execution.name, "relay-job-1");
    assert_eq!(execution.conditions, vec![Condition::new(ConditionKind::Completed, true)]);
    assert!(!execution.cancelled);
}

#[test]
fn failed_condition_becomes_completed_false_with_message() {
    let execution =
        job_to_execution(&job(vec![("Failed", "True", Some("BackoffLimitExceeded"))], None));
    assert_eq!(
        execution.conditions,
        vec![Condition {
            kind: ConditionKind::Completed,
            status: false,
            message: Some("BackoffLimitExceeded".to_string()),
        }]
    );
}

#[test]
fn active_pods_become_running() {
    let execution = job_to_execution(&job(vec![], Some(1)));
    assert_eq!(execution.conditions, vec![Condition::new(ConditionKind::Running, true)]);
}

#[test]
fn other_conditions_are_kept_as_other() {
    let execution = job_to_execution(&job(vec![("Suspended", "True", None)], None));
    assert_eq!(execution.conditions[0].kind, ConditionKind::Other("Suspended".to_string()));
}

#[test]
fn cancel_annotation_and_times() {
    let mut j = job(vec![], None);
    let mut annotations = BTreeMap::new();
    annotations.insert(CANCEL_ANNOTATION.to_string(), "true".to_string());
    j.metadata.annotations = Some(annotations);
    let started = Utc::now();
    if let Some(status) = j.status.as_mut() {
        status.start_time = Some(Time(started));
    }

    let execution = job_to_execution(&j);
    assert!(execution.cancelled);
    assert_eq!(execution.started_at, Some(started));
    assert_eq!(execution.completed_at, None);
}

#[test]
fn parse_timestamped_line() {
    let entry = parse_log_line("2026-03-01T10:00:00.123456789Z transcribing a.mp3");
    assert_eq!(entry.message, "transcribing a.mp3");
    let ts = entry.timestamp.unwrap();
    assert_eq!(ts.to_rfc3339(), "2026-03-01T10:00:00.123456789+00:00");
}

#[test]
fn parse_untimestamped_line() {
    let entry = parse_log_line("plain output");
    assert_eq!(entry, LogEntry { timestamp: None, message: "plain output".to_string() });
}

fn api(code: u16) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("status {}", code),
        reason: "Reason".to_string(),
        code,
    })
}

#[yare::parameterized(
    not_found    = { 404, "not_found" },
    unauthorized = { 401, "auth" },
    forbidden    = { 403, "auth" },
    conflict     = { 409, "transient" },
    throttled    = { 429, "transient" },
    unavailable  = { 503, "transient" },
    invalid      = { 422, "spawn" },
)]
fn api_errors_are_classified(code: u16, kind: &str) {
    let actual = match api_error(api(code), "relay-job-1") {
        RunnerError::NotFound(id) => {
            assert_eq!(id, "relay-job-1");
            "not_found"
        }
        RunnerError::Auth(_) => "auth",
        RunnerError::Transient(_) => "transient",
        RunnerError::Spawn(_) => "spawn",
        other => panic!("unexpected {:?}", other),
    };
    assert_eq!(actual, kind);
}

#[test]
fn default_config() {
    let config: KubeRunnerConfig = serde_json::from_str(r#"{"image": "w:2"}"#).unwrap();
    assert_eq!(config.namespace, "default");
    assert_eq!(config.image, "w:2");
    assert_eq!(config.name_prefix, "relay-job");
    assert!(config.command.is_empty());
}

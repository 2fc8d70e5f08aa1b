// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use relay_core::ResourceRequirements;

fn request() -> ExecutionRequest {
    let mut env = BTreeMap::new();
    env.insert("RELAY_SOURCE_PATH".to_string(), "/raw/a.mp3".to_string());
    env.insert("SHARED".to_string(), "override".to_string());
    let mut annotations = BTreeMap::new();
    annotations.insert("file_name".to_string(), "a.mp3".to_string());
    ExecutionRequest {
        job_type: "transcription".to_string(),
        env,
        resources: ResourceRequirements { cpu: "2".into(), memory: "4Gi".into(), timeout_seconds: 900 },
        annotations,
    }
}

fn config() -> KubeRunnerConfig {
    let mut config = KubeRunnerConfig {
        namespace: "media".to_string(),
        image: "registry/worker:1".to_string(),
        service_account: Some("worker-sa".to_string()),
        ..KubeRunnerConfig::default()
    };
    config.env.insert("SHARED".to_string(), "template".to_string());
    config.env.insert("REGION".to_string(), "eu".to_string());
    config
}

#[test]
fn job_carries_identity_labels_and_annotations() {
    let job = build_job("relay-job-abc", &config(), &request());

    assert_eq!(job.metadata.name.as_deref(), Some("relay-job-abc"));
    assert_eq!(job.metadata.namespace.as_deref(), Some("media"));
    let labels = job.metadata.labels.unwrap();
    assert_eq!(labels[MANAGED_BY_LABEL], MANAGED_BY);
    assert_eq!(labels[JOB_TYPE_LABEL], "transcription");
    assert_eq!(job.metadata.annotations.unwrap()["relay.dev/file_name"], "a.mp3");
}

#[test]
fn container_env_layers_request_over_template() {
    let job = build_job("j", &config(), &request());
    let spec = job.spec.unwrap();
    let pod = spec.template.spec.unwrap();
    let container = &pod.containers[0];

    let env: BTreeMap<_, _> = container
        .env
        .clone()
        .unwrap()
        .into_iter()
        .map(|e| (e.name, e.value.unwrap_or_default()))
        .collect();
    assert_eq!(env["SHARED"], "override");
    assert_eq!(env["REGION"], "eu");
    assert_eq!(env["RELAY_SOURCE_PATH"], "/raw/a.mp3");

    assert_eq!(container.image.as_deref(), Some("registry/worker:1"));
    assert!(container.command.is_none());
    assert_eq!(pod.restart_policy.as_deref(), Some("Never"));
    assert_eq!(pod.service_account_name.as_deref(), Some("worker-sa"));
}

#[test]
fn resources_and_deadline() {
    let job = build_job("j", &config(), &request());
    let spec = job.spec.unwrap();
    assert_eq!(spec.active_deadline_seconds, Some(900));
    assert_eq!(spec.backoff_limit, Some(0));
    assert_eq!(spec.ttl_seconds_after_finished, Some(86_400));

    let pod = spec.template.spec.unwrap();
    let resources = pod.containers[0].resources.clone().unwrap();
    let limits = resources.limits.unwrap();
    assert_eq!(limits["cpu"], Quantity("2".to_string()));
    assert_eq!(limits["memory"], Quantity("4Gi".to_string()));
    assert_eq!(resources.requests.unwrap()["memory"], Quantity("4Gi".to_string()));
}

#[yare::parameterized(
    plain       = { "transcription", "transcription" },
    spaces      = { "speech to text", "speech-to-text" },
    edges       = { "_job_", "job" },
    unicode     = { "tränscribe", "tr-nscribe" },
)]
fn label_values(raw: &str, expected: &str) {
    assert_eq!(label_value(raw), expected);
}

#[test]
fn label_value_is_bounded() {
    let long = "a".repeat(100);
    assert_eq!(label_value(&long).len(), 63);
}

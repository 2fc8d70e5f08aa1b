// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job manifest construction for Kubernetes batch executions.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, PodSpec, PodTemplateSpec, ResourceRequirements as PodResources,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use super::k8s::KubeRunnerConfig;
use super::ExecutionRequest;

pub(super) const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub(super) const MANAGED_BY: &str = "relay";
pub(super) const JOB_TYPE_LABEL: &str = "relay.dev/job-type";
pub(super) const CANCEL_ANNOTATION: &str = "relay.dev/cancelled";
const ANNOTATION_PREFIX: &str = "relay.dev/";
const CONTAINER_NAME: &str = "worker";

/// Build the Job for one execution of the configured worker template.
pub(super) fn build_job(name: &str, config: &KubeRunnerConfig, request: &ExecutionRequest) -> Job {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED_BY_LABEL.to_string(), MANAGED_BY.to_string());
    labels.insert(JOB_TYPE_LABEL.to_string(), label_value(&request.job_type));

    let annotations: BTreeMap<String, String> = request
        .annotations
        .iter()
        .map(|(k, v)| (format!("{}{}", ANNOTATION_PREFIX, label_value(k)), v.clone()))
        .collect();

    // Template environment first, per-execution overrides win
    let mut env_map = config.env.clone();
    env_map.extend(request.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    let env: Vec<EnvVar> = env_map.iter().map(|(k, v)| env_var(k, v)).collect();

    let mut quantities = BTreeMap::new();
    quantities.insert("cpu".to_string(), Quantity(request.resources.cpu.clone()));
    quantities.insert("memory".to_string(), Quantity(request.resources.memory.clone()));

    let container = Container {
        name: CONTAINER_NAME.to_string(),
        image: Some(config.image.clone()),
        command: (!config.command.is_empty()).then(|| config.command.clone()),
        env: Some(env),
        resources: Some(PodResources {
            requests: Some(quantities.clone()),
            limits: Some(quantities),
            ..Default::default()
        }),
        ..Default::default()
    };

    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(config.namespace.clone()),
            labels: Some(labels.clone()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(JobSpec {
            backoff_limit: Some(config.backoff_limit),
            active_deadline_seconds: i64::try_from(request.resources.timeout_seconds).ok(),
            ttl_seconds_after_finished: config.ttl_seconds_after_finished,
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
                spec: Some(PodSpec {
                    containers: vec![container],
                    restart_policy: Some("Never".to_string()),
                    service_account_name: config.service_account.clone(),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..Default::default() }
}

/// Coerce to a valid label value: `[A-Za-z0-9._-]`, at most 63 chars,
/// alphanumeric at both ends.
pub(super) fn label_value(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '-' })
        .take(63)
        .collect();
    cleaned.trim_matches(|c: char| !c.is_ascii_alphanumeric()).to_string()
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;

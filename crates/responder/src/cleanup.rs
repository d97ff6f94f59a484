// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Reaper-event handler: harvest logs from terminated jobs, then delete
//! them from the cluster.

use std::path::PathBuf;

use async_trait::async_trait;
use cds_bus::{MessageMeta, Outcome, TypedHandler};
use cds_cluster::{ClusterApi, ClusterError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ResponderConfig;
use crate::SchemaError;

/// Topic pattern reaper events arrive on.
pub const JOB_EVENT_ROUTING_PATTERN: &str = "cds.job.*";

/// A job lifecycle event as consumed from the reaper.
#[derive(Debug, Clone, Deserialize)]
pub struct JobEventMessage {
    #[serde(rename = "job-id")]
    pub job_id: String,
    #[serde(rename = "job-name")]
    pub job_name: String,
    #[serde(rename = "job-namespace")]
    pub job_namespace: String,
    #[serde(rename = "retry-count", default)]
    pub retry_count: Option<serde_json::Number>,
    #[serde(rename = "failure-reason", default)]
    pub failure_reason: Option<String>,
}

fn job_event_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "job-id": { "type": "string" },
            "job-name": { "type": "string" },
            "job-namespace": { "type": "string" },
            "retry-count": { "type": "number" },
            "failure-reason": { "type": "string" },
        },
        "required": ["job-id", "job-name", "job-namespace"],
    })
}

/// Errors from one job's log harvest. Never fatal: harvesting is
/// best-effort and must not prevent the job's deletion.
#[derive(Debug, Error)]
enum HarvestError {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Handles `cds.job.*`: on terminal events, saves every pod's log to
/// disk and removes the job from the cluster (unless retention is
/// configured). Everything else is logged and acknowledged.
pub struct CleanupHandler<C: ClusterApi> {
    validator: jsonschema::Validator,
    cluster: C,
    keep_jobs: bool,
    pod_logs_basepath: Option<PathBuf>,
    pod_names_basepath: Option<PathBuf>,
}

impl<C: ClusterApi> CleanupHandler<C> {
    pub fn new(config: &ResponderConfig, cluster: C) -> Result<Self, SchemaError> {
        let schema = job_event_schema();
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError(e.to_string()))?;
        Ok(Self {
            validator,
            cluster,
            keep_jobs: config.keep_jobs,
            pod_logs_basepath: config.pod_logs_basepath.clone(),
            pod_names_basepath: config.pod_names_basepath.clone(),
        })
    }

    /// Save every pod log under `POD_LOGS_BASEPATH/<job-name>/` and the
    /// pod names under `POD_NAMES_BASEPATH/<job-id>.txt`. Returns how
    /// many pod logs were written.
    async fn read_logs(&self, message: &JobEventMessage) -> Result<usize, HarvestError> {
        let Some(base) = &self.pod_logs_basepath else {
            warn!(
                "if you want pod logs to be saved, set POD_LOGS_BASEPATH to a writable filepath"
            );
            return Ok(0);
        };

        let pods =
            self.cluster.list_job_pods(&message.job_namespace, &message.job_name).await?;

        let dest = base.join(&message.job_name);
        std::fs::create_dir_all(&dest)
            .map_err(|source| HarvestError::Io { path: dest.clone(), source })?;

        for pod in &pods {
            let log = self.cluster.pod_log(&message.job_namespace, pod).await?;
            let path = dest.join(format!("{pod}.log"));
            debug!(pod, bytes = log.len(), path = %path.display(), "saving pod log");
            std::fs::write(&path, log)
                .map_err(|source| HarvestError::Io { path: path.clone(), source })?;
        }

        if let Some(names_base) = &self.pod_names_basepath {
            let path = names_base.join(format!("{}.txt", message.job_id));
            let listing: String = pods.iter().map(|p| format!("{p}\n")).collect();
            std::fs::write(&path, listing)
                .map_err(|source| HarvestError::Io { path: path.clone(), source })?;
        }

        Ok(pods.len())
    }

    /// Delete the job; failures are logged, never raised.
    async fn safe_delete_job(&self, name: &str, namespace: &str) {
        if let Err(e) = self.cluster.delete_job(name, namespace).await {
            error!(job = name, namespace, error = %e, "could not remove the job");
        }
    }
}

#[async_trait]
impl<C: ClusterApi> TypedHandler for CleanupHandler<C> {
    type Message = JobEventMessage;

    fn routing_pattern(&self) -> &str {
        JOB_EVENT_ROUTING_PATTERN
    }

    fn validator(&self) -> &jsonschema::Validator {
        &self.validator
    }

    async fn on_message(&self, meta: MessageMeta<'_>, message: JobEventMessage) -> Outcome {
        debug!(
            routing_key = meta.routing_key,
            job = %message.job_name,
            uid = %message.job_id,
            exchange = meta.exchange,
            "got a job event"
        );

        if meta.routing_key != "cds.job.failed" && meta.routing_key != "cds.job.success" {
            info!(job = %message.job_name, "job is in progress");
            return Outcome::Ack;
        }

        match self.read_logs(&message).await {
            Ok(saved) => {
                info!(job = %message.job_name, saved, "job terminated, saved pod logs");
            }
            Err(e) => {
                error!(job = %message.job_name, error = %e, "could not save job logs");
            }
        }

        if self.keep_jobs {
            info!(
                job = %message.job_name,
                "retaining job in cluster as KEEP_JOBS is set; set it to 'no' to remove completed jobs"
            );
        } else {
            info!(job = %message.job_name, "removing completed job");
            self.safe_delete_job(&message.job_name, &message.job_namespace).await;
        }
        Outcome::Ack
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;

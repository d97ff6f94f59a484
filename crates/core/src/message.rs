// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Bus message bodies shared by the two daemons.

use serde::{Deserialize, Serialize};

use crate::status::{classify, failure_reason, JobPhase, JobSnapshot};

/// Lifecycle event published for each observed job transition, on routing
/// key `cds.job.<phase>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEvent {
    #[serde(rename = "job-id")]
    pub job_id: String,
    #[serde(rename = "job-name")]
    pub job_name: String,
    #[serde(rename = "job-namespace")]
    pub job_namespace: String,
    #[serde(rename = "retry-count")]
    pub retry_count: i32,
    /// Present on `failed` events only.
    #[serde(rename = "failure-reason", default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobEvent {
    /// Build the event for a job's current snapshot, or `None` when the
    /// snapshot matches no phase.
    pub fn from_snapshot(
        uid: &str,
        name: &str,
        namespace: &str,
        snapshot: &JobSnapshot,
    ) -> Option<(JobPhase, JobEvent)> {
        let phase = classify(snapshot)?;
        let event = JobEvent {
            job_id: uid.to_string(),
            job_name: name.to_string(),
            job_namespace: namespace.to_string(),
            retry_count: snapshot.failed.unwrap_or(0),
            failure_reason: (phase == JobPhase::Failed).then(|| failure_reason(snapshot)),
        };
        Some((phase, event))
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

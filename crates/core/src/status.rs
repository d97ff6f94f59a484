// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Classify a Job status snapshot into a discrete phase.
//!
//! The cluster's status object is eventually consistent and most of its
//! fields are optional; the rules below are ordered so that the first
//! match wins. `retry` must be tested before `starting` and `failed`
//! because a retrying job also satisfies those weaker shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a Job's status, as reported by the cluster.
///
/// Counts may be absent entirely, which is distinct from zero: a job that
/// has never scheduled a pod reports `active: None`, not `active: Some(0)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobSnapshot {
    /// Number of currently running pods.
    pub active: Option<i32>,
    /// Number of failed attempts so far.
    pub failed: Option<i32>,
    /// Number of successful completions.
    pub succeeded: Option<i32>,
    /// When the controller first started the job.
    pub start_time: Option<DateTime<Utc>>,
    /// Conditions attached to the job, in cluster order.
    pub conditions: Vec<JobCondition>,
}

/// A single condition from the status object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobCondition {
    pub reason: Option<String>,
    pub message: Option<String>,
    pub last_probe_time: Option<DateTime<Utc>>,
}

/// The closed set of phases we publish events for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Starting,
    Running,
    Retry,
    Failed,
    Success,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Starting => "starting",
            JobPhase::Running => "running",
            JobPhase::Retry => "retry",
            JobPhase::Failed => "failed",
            JobPhase::Success => "success",
        }
    }

    /// Routing key this phase is published under.
    pub fn routing_key(&self) -> String {
        format!("cds.job.{}", self.as_str())
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive a phase from a snapshot. First matching rule wins.
///
/// Returns `None` for shapes that match no rule (e.g. a snapshot with a
/// start time but no counts before any pod has scheduled); the watcher
/// treats that as a no-op for the event.
pub fn classify(s: &JobSnapshot) -> Option<JobPhase> {
    let active = s.active.unwrap_or(0);
    let failed = s.failed.unwrap_or(0);
    let succeeded = s.succeeded.unwrap_or(0);

    if active > 0 && failed == 0 {
        Some(JobPhase::Running)
    } else if active > 0 && failed > 0 {
        Some(JobPhase::Retry)
    } else if s.start_time.is_none()
        && s.active.is_none()
        && s.failed.is_none()
        && s.succeeded.is_none()
    {
        Some(JobPhase::Starting)
    } else if active == 0 && succeeded == 0 && s.start_time.is_some() {
        Some(JobPhase::Failed)
    } else if active == 0 && succeeded > 0 {
        Some(JobPhase::Success)
    } else {
        None
    }
}

/// The condition with the greatest `last_probe_time`, or `None` for an
/// empty list. Conditions without a probe time sort earliest.
pub fn most_recent_condition(conditions: &[JobCondition]) -> Option<&JobCondition> {
    conditions.iter().max_by_key(|c| c.last_probe_time)
}

/// Human-readable failure reason: `"<reason> - <message>"` from the most
/// recent condition, or `"Unknown"` when the job carries no conditions.
/// A condition missing either field renders it as `"<none>"`.
pub fn failure_reason(s: &JobSnapshot) -> String {
    match most_recent_condition(&s.conditions) {
        Some(cond) => format!(
            "{} - {}",
            cond.reason.as_deref().unwrap_or("<none>"),
            cond.message.as_deref().unwrap_or("<none>")
        ),
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Convert the cluster's Job status object into the pure snapshot the
//! classifier works on.

use cds_core::{JobCondition, JobSnapshot};
use k8s_openapi::api::batch::v1::Job;

/// The status portion of a Job as a [`JobSnapshot`]. A job with no
/// status block at all reads as the all-absent snapshot.
pub fn snapshot_of(job: &Job) -> JobSnapshot {
    let status = job.status.as_ref();
    JobSnapshot {
        active: status.and_then(|s| s.active),
        failed: status.and_then(|s| s.failed),
        succeeded: status.and_then(|s| s.succeeded),
        start_time: status.and_then(|s| s.start_time.as_ref()).map(|t| t.0),
        conditions: status
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .map(|c| JobCondition {
                        reason: c.reason.clone(),
                        message: c.message.clone(),
                        last_probe_time: c.last_probe_time.as_ref().map(|t| t.0),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;

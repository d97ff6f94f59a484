// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

use super::*;
use chrono::TimeZone;
use k8s_openapi::api::batch::v1::{JobCondition as K8sJobCondition, JobStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;

fn t(h: u32) -> Time {
    match chrono::Utc.with_ymd_and_hms(2021, 1, 2, h, 0, 0) {
        chrono::LocalResult::Single(t) => Time(t),
        _ => panic!("bad test timestamp"),
    }
}

#[test]
fn statusless_job_is_all_absent() {
    let job = Job::default();
    let snapshot = snapshot_of(&job);
    assert_eq!(snapshot, JobSnapshot::default());
}

#[test]
fn counts_and_start_time_carry_over() {
    let job = Job {
        status: Some(JobStatus {
            active: Some(1),
            failed: Some(2),
            succeeded: Some(0),
            start_time: Some(t(3)),
            ..Default::default()
        }),
        ..Default::default()
    };
    let snapshot = snapshot_of(&job);
    assert_eq!(snapshot.active, Some(1));
    assert_eq!(snapshot.failed, Some(2));
    assert_eq!(snapshot.succeeded, Some(0));
    assert_eq!(snapshot.start_time, Some(t(3).0));
}

#[test]
fn conditions_keep_order_and_fields() {
    let job = Job {
        status: Some(JobStatus {
            conditions: Some(vec![
                K8sJobCondition {
                    reason: Some("DeadlineExceeded".into()),
                    message: Some("too slow".into()),
                    last_probe_time: Some(t(1)),
                    status: "True".into(),
                    type_: "Failed".into(),
                    ..Default::default()
                },
                K8sJobCondition {
                    reason: None,
                    message: None,
                    last_probe_time: None,
                    status: "True".into(),
                    type_: "Failed".into(),
                    ..Default::default()
                },
            ]),
            ..Default::default()
        }),
        ..Default::default()
    };
    let snapshot = snapshot_of(&job);
    assert_eq!(snapshot.conditions.len(), 2);
    assert_eq!(snapshot.conditions[0].reason.as_deref(), Some("DeadlineExceeded"));
    assert_eq!(snapshot.conditions[0].last_probe_time, Some(t(1).0));
    assert!(snapshot.conditions[1].reason.is_none());
}

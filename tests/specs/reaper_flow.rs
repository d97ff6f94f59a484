// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Watch → classify → publish → journal, end to end against fakes.

use crate::prelude::*;
use k8s_openapi::api::batch::v1::{JobCondition, JobStatus};
use kube::core::WatchEvent;

#[tokio::test]
async fn succeeded_job_publishes_success_event() {
    let sender = FakeNotifier::new();
    let journal = FakeCursorStore::new();
    let mut watcher = JobWatcher::new(sender.clone(), journal.clone(), "ns");

    let succeeded = job(
        "cds-abc",
        "u",
        "100",
        JobStatus {
            active: Some(0),
            succeeded: Some(1),
            start_time: Some(start_time()),
            ..Default::default()
        },
    );
    watcher.handle_event(WatchEvent::Modified(succeeded)).await.unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].routing_key, "cds.job.success");
    assert_eq!(
        sent[0].body,
        serde_json::json!({
            "job-id": "u",
            "job-name": "cds-abc",
            "job-namespace": "ns",
            "retry-count": 0,
        })
    );
}

#[tokio::test]
async fn failed_job_carries_the_most_recent_condition() {
    let sender = FakeNotifier::new();
    let journal = FakeCursorStore::new();
    let mut watcher = JobWatcher::new(sender.clone(), journal.clone(), "ns");

    let failed = job(
        "cds-abc",
        "u",
        "101",
        JobStatus {
            active: Some(0),
            failed: Some(1),
            start_time: Some(start_time()),
            conditions: Some(vec![JobCondition {
                reason: Some("it hit the ground falling".into()),
                message: Some("it went splat".into()),
                last_probe_time: Some(start_time()),
                status: "True".into(),
                type_: "Failed".into(),
                ..Default::default()
            }]),
            ..Default::default()
        },
    );
    watcher.handle_event(WatchEvent::Modified(failed)).await.unwrap();

    let sent = sender.sent();
    assert_eq!(sent[0].routing_key, "cds.job.failed");
    assert_eq!(sent[0].body["retry-count"], 1);
    assert_eq!(sent[0].body["failure-reason"], "it hit the ground falling - it went splat");
}

#[tokio::test]
async fn retrying_job_reports_its_failure_count() {
    let sender = FakeNotifier::new();
    let journal = FakeCursorStore::new();
    let mut watcher = JobWatcher::new(sender.clone(), journal.clone(), "ns");

    let retrying =
        job("cds-abc", "u", "102", JobStatus { active: Some(1), failed: Some(2), ..Default::default() });
    watcher.handle_event(WatchEvent::Modified(retrying)).await.unwrap();

    let sent = sender.sent();
    assert_eq!(sent[0].routing_key, "cds.job.retry");
    assert_eq!(sent[0].body["retry-count"], 2);
}

#[tokio::test]
async fn cursor_tracks_the_last_confirmed_publish() {
    let sender = FakeNotifier::new();
    let journal = FakeCursorStore::new();
    let mut watcher = JobWatcher::new(sender.clone(), journal.clone(), "ns");

    let running = |rv: &str| {
        job("cds-abc", "u", rv, JobStatus { active: Some(1), ..Default::default() })
    };
    watcher.handle_event(WatchEvent::Added(running("5"))).await.unwrap();
    watcher.handle_event(WatchEvent::Modified(running("9"))).await.unwrap();
    // A foreign job and an unclassifiable snapshot publish nothing and
    // must not advance the cursor.
    watcher
        .handle_event(WatchEvent::Modified(job(
            "unrelated-workload",
            "x",
            "11",
            JobStatus { active: Some(1), ..Default::default() },
        )))
        .await
        .unwrap();
    watcher
        .handle_event(WatchEvent::Modified(job(
            "cds-abc",
            "u",
            "12",
            JobStatus { failed: Some(1), ..Default::default() },
        )))
        .await
        .unwrap();

    assert_eq!(sender.sent().len(), 2);
    assert_eq!(journal.cursor(), Some(9));
}

#[tokio::test]
async fn restart_from_journalled_cursor_republishes_at_least_once() {
    let sender = FakeNotifier::new();
    let journal = FakeCursorStore::new();

    let terminal = job(
        "cds-abc",
        "u",
        "200",
        JobStatus {
            active: Some(0),
            succeeded: Some(1),
            start_time: Some(start_time()),
            ..Default::default()
        },
    );

    // First run: publish confirmed, then crash before the cursor write.
    {
        let watcher = JobWatcher::new(sender.clone(), journal.clone(), "ns");
        watcher.check_job(&terminal).await.unwrap();
        // No record_cursor call: simulating the crash window.
    }
    assert_eq!(journal.cursor(), None);

    // Restart: the same event is re-delivered from the watch and
    // published again; duplicates are the documented contract.
    let mut watcher = JobWatcher::new(sender.clone(), journal.clone(), "ns");
    watcher.handle_event(WatchEvent::Modified(terminal)).await.unwrap();

    let sent = sender.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].body, sent[1].body);
    assert_eq!(journal.cursor(), Some(200));
}

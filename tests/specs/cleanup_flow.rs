// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Terminal job event → harvested logs → deleted job, end to end.

use crate::prelude::*;

fn event_meta(routing_key: &str) -> MessageMeta<'_> {
    MessageMeta { exchange: "cdsresponder", routing_key, delivery_tag: 9 }
}

fn event_body() -> serde_json::Value {
    serde_json::json!({
        "job-id": "some-uid",
        "job-name": "some-job",
        "job-namespace": "job-namespace",
        "retry-count": 0,
    })
}

#[tokio::test]
async fn success_event_saves_both_pod_logs_and_deletes_the_job() {
    let fixture = responder_fixture(false);
    let cluster = FakeCluster::new();
    cluster.add_pod("some-job", "some-job-pod-a", "first pod output");
    cluster.add_pod("some-job", "some-job-pod-b", "second pod output");
    let cleanup = CleanupHandler::new(&fixture.config, cluster.clone()).unwrap();

    let outcome = cleanup.receive(event_meta("cds.job.success"), event_body()).await;
    assert_eq!(outcome, Outcome::Ack);

    let job_dir = fixture.logs_dir.path().join("some-job");
    assert_eq!(
        std::fs::read_to_string(job_dir.join("some-job-pod-a.log")).unwrap(),
        "first pod output"
    );
    assert_eq!(
        std::fs::read_to_string(job_dir.join("some-job-pod-b.log")).unwrap(),
        "second pod output"
    );

    // Pod names recorded against the job id.
    let names = std::fs::read_to_string(fixture.names_dir.path().join("some-uid.txt")).unwrap();
    assert_eq!(names, "some-job-pod-a\nsome-job-pod-b\n");

    assert_eq!(cluster.deleted(), [("some-job".to_string(), "job-namespace".to_string())]);
}

#[tokio::test]
async fn keep_jobs_retains_the_job() {
    let fixture = responder_fixture(true);
    let cluster = FakeCluster::new();
    cluster.add_pod("some-job", "some-job-pod-a", "output");
    let cleanup = CleanupHandler::new(&fixture.config, cluster.clone()).unwrap();

    let outcome = cleanup.receive(event_meta("cds.job.success"), event_body()).await;
    assert_eq!(outcome, Outcome::Ack);

    // Logs still harvested, job left alone.
    assert!(fixture.logs_dir.path().join("some-job").join("some-job-pod-a.log").exists());
    assert!(cluster.deleted().is_empty());
}

#[tokio::test]
async fn in_progress_events_change_nothing() {
    let fixture = responder_fixture(false);
    let cluster = FakeCluster::new();
    cluster.add_pod("some-job", "some-job-pod-a", "output");
    let cleanup = CleanupHandler::new(&fixture.config, cluster.clone()).unwrap();

    for key in ["cds.job.running", "cds.job.starting", "cds.job.retry"] {
        let outcome = cleanup.receive(event_meta(key), event_body()).await;
        assert_eq!(outcome, Outcome::Ack);
    }
    assert!(cluster.deleted().is_empty());
    assert!(!fixture.logs_dir.path().join("some-job").exists());
}

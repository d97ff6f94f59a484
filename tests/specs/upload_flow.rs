// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Upload request → staged inmeta → launched job → report, end to end.

use crate::prelude::*;

fn upload_meta() -> MessageMeta<'static> {
    MessageMeta {
        exchange: "pluto-deliverables",
        routing_key: "deliverables.syndication.main.upload",
        delivery_tag: 1,
    }
}

fn handler(
    fixture: &ResponderFixture,
    cluster: &FakeCluster,
    sender: &FakeNotifier,
) -> LaunchHandler<FakeNotifier, FakeCluster> {
    let schema = InmetaSchema::compile(INMETA_XSD).unwrap();
    let template = JobTemplate::load(fixture.config.templates_path.as_deref()).unwrap();
    LaunchHandler::new(fixture.config.clone(), schema, template, cluster.clone(), sender.clone())
        .unwrap()
}

#[tokio::test]
async fn valid_upload_launches_a_job() {
    let fixture = responder_fixture(false);
    let cluster = FakeCluster::new();
    let sender = FakeNotifier::new();
    let launch = handler(&fixture, &cluster, &sender);

    let body = serde_json::json!({
        "inmeta": VALID_INMETA,
        "routename": "route.xml",
        "filename": "somefile.mxf",
    });
    let outcome = launch.receive(upload_meta(), body).await;
    assert_eq!(outcome, Outcome::Ack);

    // The inmeta landed under the filename's stem.
    let staged = fixture.inmeta_dir.path().join("somefile.inmeta");
    assert_eq!(std::fs::read_to_string(&staged).unwrap(), VALID_INMETA);

    // The job's command points the batch container at the staged file.
    let created = cluster.created();
    assert_eq!(created.len(), 1);
    let container =
        &created[0].job.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0];
    assert_eq!(
        container.command.as_ref().unwrap().as_slice(),
        [
            "/usr/local/bin/cds_run.pl",
            "--input-inmeta",
            &staged.display().to_string(),
            "--route",
            "route.xml"
        ]
    );

    // A started event carried the assigned job identity.
    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].routing_key, "cds.job.started");
    assert_eq!(sent[0].body["job-id"], serde_json::json!(created[0].assigned.uid));
    assert_eq!(sent[0].body["job-namespace"], "job-namespace");
}

#[tokio::test]
async fn colliding_uploads_get_suffixed_filenames() {
    let fixture = responder_fixture(false);
    let cluster = FakeCluster::new();
    let sender = FakeNotifier::new();
    let launch = handler(&fixture, &cluster, &sender);

    let body = serde_json::json!({
        "inmeta": VALID_INMETA,
        "routename": "route.xml",
        "filename": "somefile.mxf",
    });
    launch.receive(upload_meta(), body.clone()).await;
    launch.receive(upload_meta(), body).await;

    assert!(fixture.inmeta_dir.path().join("somefile.inmeta").exists());
    assert!(fixture.inmeta_dir.path().join("somefile-1.inmeta").exists());
}

#[tokio::test]
async fn invalid_inmeta_reports_and_dead_letters() {
    let fixture = responder_fixture(false);
    let cluster = FakeCluster::new();
    let sender = FakeNotifier::new();
    let launch = handler(&fixture, &cluster, &sender);

    let body = serde_json::json!({
        "inmeta": "<meta-data><meta-group type=\"g\"><meta name=\"n\" vilue=\"v\"/></meta-group></meta-data>",
        "routename": "route.xml",
        "filename": "somefile.mxf",
    });
    let outcome = launch.receive(upload_meta(), body).await;
    assert!(matches!(outcome, Outcome::Nack(Some(_))));

    // No job, and no inmeta file left on disk.
    assert!(cluster.created().is_empty());
    assert_eq!(std::fs::read_dir(fixture.inmeta_dir.path()).unwrap().count(), 0);

    let sent = sender.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].routing_key, "cds.job.invalid");
    assert!(sent[0].body["error"].as_str().unwrap().contains("vilue"));
}

#[tokio::test]
async fn schema_invalid_message_never_reaches_the_handler_logic() {
    let fixture = responder_fixture(false);
    let cluster = FakeCluster::new();
    let sender = FakeNotifier::new();
    let launch = handler(&fixture, &cluster, &sender);

    // The consumer runtime checks this validator before dispatching; a
    // message without `routename` must fail it.
    let body = serde_json::json!({ "inmeta": VALID_INMETA });
    assert!(launch.validator().validate(&body).is_err());

    // And explicit nulls for the optional identifiers are fine.
    let nullable = serde_json::json!({
        "inmeta": VALID_INMETA,
        "routename": "route.xml",
        "filename": null,
        "online_id": null,
        "deliverable_asset": null,
    });
    assert!(launch.validator().validate(&nullable).is_ok());
}

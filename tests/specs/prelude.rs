// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Shared fixtures for the spec modules.

use k8s_openapi::api::batch::v1::{Job, JobStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::core::ObjectMeta;

pub use cds_bus::{FakeNotifier, MessageHandler, MessageMeta, Outcome};
pub use cds_cluster::FakeCluster;
pub use cds_reaper::{FakeCursorStore, JobWatcher};
pub use cds_responder::{CleanupHandler, InmetaSchema, JobTemplate, LaunchHandler, ResponderConfig};

pub const VALID_INMETA: &str = r#"<?xml version="1.0"?>
<meta-data><meta-group type="movie meta"><meta name="itemId" value="VX-1234"/></meta-group></meta-data>"#;

pub const INMETA_XSD: &str = include_str!("../../crates/responder/inmeta.xsd");
pub const TEMPLATE_YAML: &str = include_str!("../../crates/responder/templates/cdsjob.yaml");

pub fn start_time() -> Time {
    match chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2021, 1, 2, 3, 4, 5) {
        chrono::LocalResult::Single(t) => Time(t),
        _ => panic!("bad fixture timestamp"),
    }
}

pub fn job(name: &str, uid: &str, resource_version: &str, status: JobStatus) -> Job {
    Job {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            uid: Some(uid.to_string()),
            namespace: Some("ns".to_string()),
            resource_version: Some(resource_version.to_string()),
            ..Default::default()
        },
        status: Some(status),
        ..Default::default()
    }
}

/// A responder config pointing at temp directories.
pub struct ResponderFixture {
    pub config: ResponderConfig,
    pub inmeta_dir: tempfile::TempDir,
    pub logs_dir: tempfile::TempDir,
    pub names_dir: tempfile::TempDir,
    _template_dir: tempfile::TempDir,
}

pub fn responder_fixture(keep_jobs: bool) -> ResponderFixture {
    let inmeta_dir = tempfile::tempdir().unwrap();
    let logs_dir = tempfile::tempdir().unwrap();
    let names_dir = tempfile::tempdir().unwrap();
    let template_dir = tempfile::tempdir().unwrap();
    std::fs::write(template_dir.path().join("cdsjob.yaml"), TEMPLATE_YAML)
        .unwrap();

    let config = ResponderConfig {
        namespace: "job-namespace".to_string(),
        my_exchange: "cdsresponder".to_string(),
        upstream_exchange: "pluto-deliverables".to_string(),
        inmeta_path: Some(inmeta_dir.path().to_path_buf()),
        keep_jobs,
        pod_logs_basepath: Some(logs_dir.path().to_path_buf()),
        pod_names_basepath: Some(names_dir.path().to_path_buf()),
        templates_path: Some(template_dir.path().to_path_buf()),
    };
    ResponderFixture { config, inmeta_dir, logs_dir, names_dir, _template_dir: template_dir }
}

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

use super::*;
use serial_test::serial;

#[yare::parameterized(
    unset       = { None, false },
    yes         = { Some("yes"), true },
    yes_mixed   = { Some("Yes"), true },
    truthy      = { Some("true"), true },
    true_upper  = { Some("TRUE"), true },
    no          = { Some("no"), false },
    falsy       = { Some("false"), false },
)]
fn keep_jobs_values(value: Option<&str>, expected: bool) {
    assert_eq!(parse_keep_jobs(value).unwrap(), expected);
}

#[yare::parameterized(
    number  = { "1" },
    word    = { "keep" },
    spaced  = { " yes" },
)]
fn keep_jobs_rejects_other_literals(value: &str) {
    assert!(matches!(parse_keep_jobs(Some(value)), Err(ConfigError::BadKeepJobs(_))));
}

#[test]
#[serial(responder_env)]
fn from_env_defaults() {
    for name in [
        "MY_EXCHANGE",
        "UPSTREAM_EXCHANGE",
        "INMETA_PATH",
        "KEEP_JOBS",
        "POD_LOGS_BASEPATH",
        "POD_NAMES_BASEPATH",
        "TEMPLATES_PATH",
    ] {
        std::env::remove_var(name);
    }
    let config = ResponderConfig::from_env("some-namespace").unwrap();
    assert_eq!(config.namespace, "some-namespace");
    assert_eq!(config.my_exchange, "cdsresponder");
    assert_eq!(config.upstream_exchange, "pluto-deliverables");
    assert!(config.inmeta_path.is_none());
    assert!(!config.keep_jobs);
    assert!(config.pod_logs_basepath.is_none());
}

#[test]
#[serial(responder_env)]
fn from_env_reads_overrides() {
    std::env::set_var("MY_EXCHANGE", "cds-test");
    std::env::set_var("UPSTREAM_EXCHANGE", "uploads");
    std::env::set_var("INMETA_PATH", "/srv/inmeta");
    std::env::set_var("KEEP_JOBS", "yes");
    let config = ResponderConfig::from_env("ns").unwrap();
    assert_eq!(config.my_exchange, "cds-test");
    assert_eq!(config.upstream_exchange, "uploads");
    assert_eq!(config.inmeta_path.as_deref(), Some(std::path::Path::new("/srv/inmeta")));
    assert!(config.keep_jobs);
    for name in ["MY_EXCHANGE", "UPSTREAM_EXCHANGE", "INMETA_PATH", "KEEP_JOBS"] {
        std::env::remove_var(name);
    }
}

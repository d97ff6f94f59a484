// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

use super::*;
use serial_test::serial;

fn clear_env() {
    for name in [
        "RABBITMQ_HOST",
        "RABBITMQ_PORT",
        "RABBITMQ_VHOST",
        "RABBITMQ_USER",
        "RABBITMQ_PASSWD",
        "RABBITMQ_CONNECTION_ATTEMPTS",
        "RABBITMQ_RETRY_DELAY",
    ] {
        std::env::remove_var(name);
    }
}

#[test]
#[serial(rabbitmq_env)]
fn from_env_defaults() {
    clear_env();
    std::env::set_var("RABBITMQ_HOST", "mq.example.com");
    let config = BusConfig::from_env().unwrap();
    assert_eq!(config.host, "mq.example.com");
    assert_eq!(config.port, 5672);
    assert_eq!(config.vhost, "/");
    assert_eq!(config.connection_attempts, 3);
    assert_eq!(config.retry_delay, 3);
}

#[test]
#[serial(rabbitmq_env)]
fn from_env_requires_host() {
    clear_env();
    assert!(matches!(BusConfig::from_env(), Err(BusConfigError::MissingHost)));
}

#[test]
#[serial(rabbitmq_env)]
fn from_env_rejects_unparseable_port() {
    clear_env();
    std::env::set_var("RABBITMQ_HOST", "mq");
    std::env::set_var("RABBITMQ_PORT", "not-a-port");
    assert!(matches!(BusConfig::from_env(), Err(BusConfigError::BadNumber("RABBITMQ_PORT", _))));
    clear_env();
}

#[test]
fn amqp_uri_encodes_default_vhost() {
    let config = BusConfig {
        host: "mq".into(),
        port: 5672,
        vhost: "/".into(),
        username: "user".into(),
        password: "pass".into(),
        connection_attempts: 3,
        retry_delay: 3,
    };
    assert_eq!(config.amqp_uri(), "amqp://user:pass@mq:5672/%2f");
}

#[test]
fn amqp_uri_encodes_reserved_credential_bytes() {
    let config = BusConfig {
        host: "mq".into(),
        port: 5672,
        vhost: "/".into(),
        username: "svc@cds".into(),
        password: "p:a/s?s#1%2+3".into(),
        connection_attempts: 3,
        retry_delay: 3,
    };
    assert_eq!(config.amqp_uri(), "amqp://svc%40cds:p%3aa%2fs%3fs%231%252%2b3@mq:5672/%2f");
}

#[test]
fn amqp_uri_passes_named_vhost() {
    let config = BusConfig {
        host: "mq".into(),
        port: 5671,
        vhost: "prod".into(),
        username: "u".into(),
        password: "p".into(),
        connection_attempts: 1,
        retry_delay: 1,
    };
    assert_eq!(config.amqp_uri(), "amqp://u:p@mq:5671/prod");
}

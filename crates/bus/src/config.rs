// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Broker connection parameters.

use thiserror::Error;

/// Errors raised while reading broker configuration from the environment.
#[derive(Debug, Error)]
pub enum BusConfigError {
    #[error("RABBITMQ_HOST is not set")]
    MissingHost,

    #[error("{0} is not a number: {1}")]
    BadNumber(&'static str, String),
}

/// Connection parameters for the message broker, read once at startup and
/// passed explicitly into the publisher and consumer constructors.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub vhost: String,
    pub username: String,
    pub password: String,
    /// TCP-level connect attempts before a setup attempt is counted as
    /// failed.
    pub connection_attempts: u32,
    /// Seconds between TCP-level connect attempts.
    pub retry_delay: u64,
}

impl BusConfig {
    /// Read configuration from `RABBITMQ_*` environment variables.
    pub fn from_env() -> Result<Self, BusConfigError> {
        Ok(Self {
            host: std::env::var("RABBITMQ_HOST").map_err(|_| BusConfigError::MissingHost)?,
            port: parse_var("RABBITMQ_PORT", 5672)?,
            vhost: std::env::var("RABBITMQ_VHOST").unwrap_or_else(|_| "/".to_string()),
            username: std::env::var("RABBITMQ_USER").unwrap_or_else(|_| "guest".to_string()),
            password: std::env::var("RABBITMQ_PASSWD").unwrap_or_else(|_| "guest".to_string()),
            connection_attempts: parse_var("RABBITMQ_CONNECTION_ATTEMPTS", 3)?,
            retry_delay: parse_var("RABBITMQ_RETRY_DELAY", 3)?,
        })
    }

    /// AMQP URI for this configuration. Credentials and vhost are
    /// percent-encoded: generated broker passwords routinely contain
    /// URI-reserved bytes, and the default vhost is `/`.
    pub fn amqp_uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/{}",
            percent_encode(&self.username),
            percent_encode(&self.password),
            self.host,
            self.port,
            percent_encode(&self.vhost)
        )
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, BusConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| BusConfigError::BadNumber(name, raw)),
        Err(_) => Ok(default),
    }
}

fn percent_encode(vhost: &str) -> String {
    let mut out = String::with_capacity(vhost.len());
    for b in vhost.bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02x}")),
        }
    }
    out
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

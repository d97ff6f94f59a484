// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Responder configuration, read once at startup and passed into the
//! handler constructors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading responder configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "you must set KEEP_JOBS to either 'yes' or 'no' (got '{0}'); remember to quote these strings in a yaml document"
    )]
    BadKeepJobs(String),
}

/// Everything the responder's handlers need beyond their connections.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Namespace jobs are launched into and cleaned out of.
    pub namespace: String,
    /// Our own topic exchange, where job events are published.
    pub my_exchange: String,
    /// Upstream exchange carrying upload requests.
    pub upstream_exchange: String,
    /// Staging directory for inbound inmeta documents.
    pub inmeta_path: Option<PathBuf>,
    /// Retain terminated jobs in the cluster instead of deleting them.
    pub keep_jobs: bool,
    /// Where harvested pod logs go; unset disables harvesting.
    pub pod_logs_basepath: Option<PathBuf>,
    /// Where the job-id → pod-name cross-reference files go.
    pub pod_names_basepath: Option<PathBuf>,
    /// Operator override directory for the job template.
    pub templates_path: Option<PathBuf>,
}

impl ResponderConfig {
    /// Read configuration from the environment. The namespace comes from
    /// the caller because its discovery (service-account mount vs
    /// `NAMESPACE`) is a cluster concern, not a parsing one.
    pub fn from_env(namespace: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            namespace: namespace.into(),
            my_exchange: var_or("MY_EXCHANGE", "cdsresponder"),
            upstream_exchange: var_or("UPSTREAM_EXCHANGE", "pluto-deliverables"),
            inmeta_path: path_var("INMETA_PATH"),
            keep_jobs: parse_keep_jobs(std::env::var("KEEP_JOBS").ok().as_deref())?,
            pod_logs_basepath: path_var("POD_LOGS_BASEPATH"),
            pod_names_basepath: path_var("POD_NAMES_BASEPATH"),
            templates_path: path_var("TEMPLATES_PATH"),
        })
    }
}

/// `yes`/`true` keep jobs, `no`/`false`/unset delete them; anything else
/// is a configuration error, caught at startup rather than on the first
/// terminated job.
pub fn parse_keep_jobs(value: Option<&str>) -> Result<bool, ConfigError> {
    match value {
        None => Ok(false),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" => Ok(false),
            _ => Err(ConfigError::BadKeepJobs(raw.to_string())),
        },
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).ok().filter(|s| !s.is_empty()).unwrap_or_else(|| default.to_string())
}

fn path_var(name: &str) -> Option<PathBuf> {
    std::env::var(name).ok().filter(|s| !s.is_empty()).map(PathBuf::from)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

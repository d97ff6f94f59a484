// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Cluster client and namespace bootstrap.

use std::path::{Path, PathBuf};

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use thiserror::Error;
use tracing::{debug, warn};

/// Mounted service-account namespace hint, present when running in-cluster.
const NAMESPACE_FILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Errors from namespace discovery.
#[derive(Debug, Error)]
pub enum NamespaceError {
    #[error(
        "could not determine namespace from inside the cluster, and NAMESPACE was not set in the environment"
    )]
    Undetermined,
}

/// Errors from client construction.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("kubeconfig loading failed: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),

    #[error("client construction failed: {0}")]
    Client(#[from] kube::Error),
}

/// The namespace this process operates in: the service-account mount when
/// in-cluster, the `NAMESPACE` environment variable otherwise.
pub fn current_namespace() -> Result<String, NamespaceError> {
    if let Some(ns) = read_namespace_file(Path::new(NAMESPACE_FILE)) {
        return Ok(ns);
    }
    std::env::var("NAMESPACE").ok().filter(|s| !s.is_empty()).ok_or(NamespaceError::Undetermined)
}

fn read_namespace_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let trimmed = contents.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not open namespace secret file");
            None
        }
    }
}

/// Build a client: in-cluster configuration first, falling back to the
/// kubeconfig named by `KUBE_CONFIG` (or the standard discovery chain).
pub async fn cluster_client() -> Result<Client, BootstrapError> {
    let config = match Config::incluster() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "could not load in-cluster configuration, trying external connection");
            external_config().await?
        }
    };
    Ok(Client::try_from(config)?)
}

async fn external_config() -> Result<Config, kube::config::KubeconfigError> {
    let options = KubeConfigOptions::default();
    if let Ok(path) = std::env::var("KUBE_CONFIG") {
        let kubeconfig = Kubeconfig::read_from(PathBuf::from(path))?;
        return Config::from_custom_kubeconfig(kubeconfig, &options).await;
    }
    Config::from_kubeconfig(&options).await
}

#[cfg(test)]
#[path = "bootstrap_tests.rs"]
mod tests;

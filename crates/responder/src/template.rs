// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! The job template and its per-launch builder.
//!
//! The template is loaded and shape-checked once at startup and never
//! mutated; every launch clones it through [`JobDocBuilder`], so one
//! request's name, command and labels can never leak into the next.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use k8s_openapi::api::batch::v1::Job;
use thiserror::Error;
use tracing::debug;

/// Template filename looked for in each candidate directory.
const TEMPLATE_FILENAME: &str = "cdsjob.yaml";

/// System-wide fallback location.
const SYSTEM_TEMPLATE_DIR: &str = "/etc/cdsresponder/templates";

/// Errors from locating or loading the template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("no path to a cdsjob template could be found")]
    NotFound,

    #[error("could not read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {path} is not a Job document: {source}")]
    NotAJob {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("template {path} declares no containers")]
    NoContainers { path: PathBuf },
}

/// Immutable, shape-checked job template.
pub struct JobTemplate {
    job: Job,
}

impl JobTemplate {
    /// Locate the template: the operator override directory first, then
    /// the copy shipped alongside the binary, then the system path.
    pub fn find_path(templates_path: Option<&Path>) -> Result<PathBuf, TemplateError> {
        let mut candidates = Vec::new();
        if let Some(dir) = templates_path {
            candidates.push(dir.join(TEMPLATE_FILENAME));
        }
        candidates.push(PathBuf::from("templates").join(TEMPLATE_FILENAME));
        candidates.push(Path::new(SYSTEM_TEMPLATE_DIR).join(TEMPLATE_FILENAME));

        candidates.into_iter().find(|p| p.exists()).ok_or(TemplateError::NotFound)
    }

    /// Load and shape-check the template found via [`Self::find_path`].
    pub fn load(templates_path: Option<&Path>) -> Result<Self, TemplateError> {
        Self::load_from(&Self::find_path(templates_path)?)
    }

    /// Load and shape-check a specific template file.
    pub fn load_from(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| TemplateError::Io { path: path.to_path_buf(), source })?;
        let job: Job = serde_yaml::from_str(&text)
            .map_err(|source| TemplateError::NotAJob { path: path.to_path_buf(), source })?;

        let has_containers = job
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .is_some_and(|pod| !pod.containers.is_empty());
        if !has_containers {
            return Err(TemplateError::NoContainers { path: path.to_path_buf() });
        }

        debug!(path = %path.display(), "loaded job template");
        Ok(Self { job })
    }

    /// Start building a launch document from a fresh copy.
    pub fn builder(&self) -> JobDocBuilder {
        JobDocBuilder { job: self.job.clone() }
    }
}

/// Per-launch job document builder over a cloned template.
pub struct JobDocBuilder {
    job: Job,
}

impl JobDocBuilder {
    /// Set the job's cluster name.
    pub fn name(mut self, name: &str) -> Self {
        self.job.metadata.name = Some(name.to_string());
        self
    }

    /// Replace the first container's command.
    pub fn command(mut self, command: Vec<String>) -> Self {
        if let Some(container) = self
            .job
            .spec
            .as_mut()
            .and_then(|s| s.template.spec.as_mut())
            .and_then(|pod| pod.containers.first_mut())
        {
            container.command = Some(command);
        }
        self
    }

    /// Merge labels onto the job's metadata, overwriting collisions.
    pub fn labels(mut self, labels: BTreeMap<String, String>) -> Self {
        self.job.metadata.labels.get_or_insert_with(BTreeMap::new).extend(labels);
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;

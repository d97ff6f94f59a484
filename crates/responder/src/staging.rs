// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Stage inbound inmeta documents onto the shared filesystem.
//!
//! The batch container picks the document up by path, so the file must
//! exist before the job is submitted and must not clobber a document a
//! still-running job is reading. Collisions get an incrementing suffix;
//! the suffix scheme is best-effort and assumes a single responder per
//! staging directory.

use std::path::{Path, PathBuf};

use cds_core::sanitize_job_name;
use thiserror::Error;
use tracing::{error, info};

/// Give up probing for a free filename after this many candidates.
pub const MAX_SUFFIX_ATTEMPTS: u32 = 1000;

/// Errors from staging a document.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("INMETA_PATH is not set, cannot stage inbound documents")]
    NoBasePath,

    #[error("filename hint '{0}' reduces to nothing usable")]
    BlankStem(String),

    #[error("no free filename for stem '{stem}' after {attempts} attempts")]
    Exhausted { stem: String, attempts: u32 },

    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The first free path `dir/stem[-N].inmeta`, counting N up from the
/// unsuffixed form.
pub fn build_filename(dir: &Path, stem: &str) -> Result<PathBuf, StagingError> {
    let initial = dir.join(format!("{stem}.inmeta"));
    if !initial.exists() {
        return Ok(initial);
    }
    for i in 1..MAX_SUFFIX_ATTEMPTS {
        let candidate = dir.join(format!("{stem}-{i}.inmeta"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    error!(
        stem,
        attempts = MAX_SUFFIX_ATTEMPTS,
        "still colliding after probing every suffix, something must have gone wrong"
    );
    Err(StagingError::Exhausted { stem: stem.to_string(), attempts: MAX_SUFFIX_ATTEMPTS })
}

/// Derive the file stem from a filename hint: everything before the
/// first `.`, sanitised to name rules.
pub fn stem_of(filename_hint: &str) -> Result<String, StagingError> {
    let first = filename_hint.split('.').next().unwrap_or_default();
    let stem = sanitize_job_name(first);
    if stem.is_empty() {
        return Err(StagingError::BlankStem(filename_hint.to_string()));
    }
    Ok(stem)
}

/// Write the inmeta content under `base`, named from the hint, returning
/// the path written.
pub fn write_out_inmeta(
    base: Option<&Path>,
    filename_hint: &str,
    content: &str,
) -> Result<PathBuf, StagingError> {
    let base = base.ok_or(StagingError::NoBasePath)?;
    let stem = stem_of(filename_hint)?;
    let target = build_filename(base, &stem)?;
    info!(path = %target.display(), "writing inmeta content");
    std::fs::write(&target, content)
        .map_err(|source| StagingError::Io { path: target.clone(), source })?;
    Ok(target)
}

#[cfg(test)]
#[path = "staging_tests.rs"]
mod tests;

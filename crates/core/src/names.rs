// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! Sanitise free-text identifiers for use in cluster object names and
//! labels.

/// Maximum sanitised job-name length. The launcher prepends `cds-`,
/// which takes the name to the cluster's 63-character limit.
pub const JOB_NAME_MAX: usize = 59;

const LABEL_MAX: usize = 63;

/// Sanitise a string to cluster job-name rules.
///
/// Characters outside `[A-Za-z0-9-]` and whitespace are dropped, runs of
/// whitespace collapse to a single `-` (leading and trailing runs are
/// discarded entirely), the result is lowercased and truncated to
/// [`JOB_NAME_MAX`] characters.
///
/// Truncation does not re-check that the final character is alphanumeric;
/// an input whose cut point lands on a `-` yields a name the cluster will
/// reject. TODO: trim trailing hyphens after truncation (the recorded
/// names in the journal consumers need checking first).
pub fn sanitize_job_name(input: &str) -> String {
    let legal: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || c.is_whitespace())
        .collect();
    let mut out = legal.split_whitespace().collect::<Vec<_>>().join("-").to_ascii_lowercase();
    out.truncate(JOB_NAME_MAX);
    out
}

/// Sanitise a string to cluster label-value rules.
///
/// Anything outside `[A-Za-z0-9._-]` is dropped. Values that still reach
/// the 63-character limit are cut to 60 characters with a `...` marker
/// (`.` is a permitted label character).
pub fn sanitize_label(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect();
    if cleaned.len() < LABEL_MAX {
        cleaned
    } else {
        let mut out = cleaned;
        out.truncate(LABEL_MAX - 3);
        out.push_str("...");
        out
    }
}

#[cfg(test)]
#[path = "names_tests.rs"]
mod tests;

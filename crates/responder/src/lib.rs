// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cds-responder: consume upload requests and reaper events.
//!
//! Two handlers share one consumer runtime: [`launch::LaunchHandler`]
//! turns upload requests into cluster jobs, and
//! [`cleanup::CleanupHandler`] harvests logs from terminated jobs and
//! removes them.

pub mod cleanup;
pub mod config;
pub mod inmeta;
pub mod launch;
pub mod staging;
pub mod template;

pub use cleanup::{CleanupHandler, JobEventMessage, JOB_EVENT_ROUTING_PATTERN};
pub use config::{parse_keep_jobs, ConfigError, ResponderConfig};
pub use inmeta::{InmetaError, InmetaSchema, ValidationFailure};
pub use launch::{LaunchHandler, UploadRequest, UPLOAD_ROUTING_PATTERN};
pub use staging::{StagingError, MAX_SUFFIX_ATTEMPTS};
pub use template::{JobDocBuilder, JobTemplate, TemplateError};

/// A handler's declared message schema failed to compile.
#[derive(Debug, thiserror::Error)]
#[error("message schema does not compile: {0}")]
pub struct SchemaError(pub String);

// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cds-core: pure domain types for the CDS cluster bridge.
//!
//! Everything in here is deliberately free of I/O so that status
//! classification, name sanitisation and message shapes can be tested
//! without a cluster or a broker in sight.

pub mod id;
pub mod message;
pub mod names;
pub mod status;

pub use id::random_string;
pub use message::JobEvent;
pub use names::{sanitize_job_name, sanitize_label};
pub use status::{classify, JobCondition, JobPhase, JobSnapshot};

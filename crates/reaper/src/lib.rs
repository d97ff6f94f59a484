// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cds-reaper: watch cluster Jobs and publish a lifecycle event per
//! observed transition.
//!
//! The watch cursor is journalled to a key-value store after every
//! confirmed publish, so a restarted reaper resumes where it left off.
//! Losing the cursor (the cluster's event horizon) is recovered by
//! restarting the watch from "now".

pub mod journal;
pub mod snapshot;
pub mod watcher;

pub use journal::{CursorStore, Journal, JournalConfig, JournalError};
pub use snapshot::snapshot_of;
pub use watcher::{JobWatcher, WatchError};

#[cfg(any(test, feature = "test-support"))]
pub use journal::FakeCursorStore;

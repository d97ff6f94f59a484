// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! The job watch loop.
//!
//! Opens a streaming watch over the namespace's Job collection from the
//! journalled cursor, classifies each owned job's status, publishes one
//! event per transition and advances the cursor only after the broker
//! has confirmed the publish. A cursor the cluster no longer remembers
//! (HTTP 410) clears the journal and restarts the watch from "now".

use cds_bus::{Notifier, PublishError};
use cds_core::JobEvent;
use futures_util::{StreamExt, TryStreamExt};
use k8s_openapi::api::batch::v1::Job;
use kube::api::{Api, ListParams, WatchParams};
use kube::core::WatchEvent;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::journal::{CursorStore, JournalError};
use crate::snapshot::snapshot_of;

/// Only jobs whose names carry this prefix belong to us; the fleet runs
/// plenty of unrelated workloads in the same namespace.
pub const OWNED_PREFIX: &str = "cds-";

/// Errors that stop the watch loop.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("journal failure: {0}")]
    Journal(#[from] JournalError),

    #[error("publish failure: {0}")]
    Publish(#[from] PublishError),

    #[error("cluster API failure: {0}")]
    Api(#[from] kube::Error),

    #[error("job list carried no resource version")]
    NoListVersion,

    /// The cluster no longer remembers our cursor. Handled inside the
    /// loop; never escapes [`JobWatcher::run`].
    #[error("watch cursor is beyond the cluster's event horizon")]
    CursorExpired,
}

/// Single-threaded watcher over one namespace's Job collection.
pub struct JobWatcher<N: Notifier, J: CursorStore> {
    sender: N,
    journal: J,
    namespace: String,
}

impl<N: Notifier, J: CursorStore> JobWatcher<N, J> {
    pub fn new(sender: N, journal: J, namespace: impl Into<String>) -> Self {
        Self { sender, journal, namespace: namespace.into() }
    }

    /// Classify a job and publish its status event. Returns whether a
    /// publish was confirmed (unclassifiable snapshots and oversized
    /// bodies publish nothing).
    pub async fn check_job(&self, job: &Job) -> Result<bool, PublishError> {
        let uid = job.metadata.uid.as_deref().unwrap_or_default();
        let name = job.metadata.name.as_deref().unwrap_or_default();
        let namespace = job.metadata.namespace.as_deref().unwrap_or(&self.namespace);

        let snapshot = snapshot_of(job);
        let Some((phase, event)) = JobEvent::from_snapshot(uid, name, namespace, &snapshot) else {
            debug!(job = name, ?snapshot, "snapshot matches no phase, skipping");
            return Ok(false);
        };
        info!(job = name, uid, phase = %phase, "job status");

        let body = serde_json::to_value(&event)?;
        self.sender.notify(&phase.routing_key(), &body).await
    }

    /// Process one watch event: filter, classify, publish, journal.
    pub async fn handle_event(&mut self, event: WatchEvent<Job>) -> Result<(), WatchError> {
        let job = match event {
            WatchEvent::Added(job) | WatchEvent::Modified(job) => job,
            // Terminal transitions were already emitted before deletion.
            WatchEvent::Deleted(_) => return Ok(()),
            WatchEvent::Bookmark(_) => {
                debug!("watch bookmark, nothing to do");
                return Ok(());
            }
            // The run loop intercepts error notifications before they
            // reach here; anything else is an unexpected payload.
            WatchEvent::Error(e) => {
                warn!(code = e.code, message = %e.message, "received notification with unexpected payload");
                return Ok(());
            }
        };

        let name = job.metadata.name.as_deref().unwrap_or_default();
        if !name.starts_with(OWNED_PREFIX) {
            info!(job = name, "not a cds job, ignoring");
            return Ok(());
        }

        if self.check_job(&job).await? {
            self.record_cursor(&job).await?;
        }
        Ok(())
    }

    /// Journal the event's resource version, once its publish confirmed.
    async fn record_cursor(&mut self, job: &Job) -> Result<(), JournalError> {
        let Some(raw) = job.metadata.resource_version.as_deref() else {
            return Ok(());
        };
        match raw.parse::<i64>() {
            Ok(version) => self.journal.record_processed(version).await,
            Err(_) => {
                // An unjournalable cursor only costs duplicates on the
                // next restart; delivery is at-least-once anyway.
                warn!(resource_version = raw, "resource version is not numeric, not journalling");
                Ok(())
            }
        }
    }

    /// Watch forever. Only returns on unrecoverable errors; the process
    /// turns those into a distinguishable exit code so the orchestrator
    /// restarts it.
    pub async fn run(mut self, api: Api<Job>) -> Result<(), WatchError> {
        loop {
            let cursor = match self.journal.most_recent_event().await? {
                Some(version) => version.to_string(),
                None => {
                    info!("no journalled cursor to start the watch at, starting from most recent");
                    current_list_version(&api).await?
                }
            };
            info!(cursor = %cursor, namespace = %self.namespace, "initiating job watch");

            match self.watch_from(&api, &cursor).await {
                Ok(()) => debug!("watch stream ended, re-establishing"),
                Err(WatchError::CursorExpired) => {
                    warn!("cursor is beyond the event horizon, restarting from the most recent event");
                    self.journal.clear().await?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Consume one watch stream until it ends or fails.
    async fn watch_from(&mut self, api: &Api<Job>, cursor: &str) -> Result<(), WatchError> {
        let mut stream =
            api.watch(&WatchParams::default(), cursor).await.map_err(classify_gone)?.boxed();
        while let Some(event) = stream.try_next().await.map_err(classify_gone)? {
            match event {
                WatchEvent::Error(response) if response.code == 410 => {
                    return Err(WatchError::CursorExpired);
                }
                WatchEvent::Error(response) => {
                    return Err(WatchError::Api(kube::Error::Api(response)));
                }
                other => self.handle_event(other).await?,
            }
        }
        Ok(())
    }
}

/// The current list version of the Job collection, the "now" cursor.
async fn current_list_version(api: &Api<Job>) -> Result<String, WatchError> {
    let list = api.list(&ListParams::default().limit(1)).await?;
    list.metadata.resource_version.ok_or(WatchError::NoListVersion)
}

fn classify_gone(e: kube::Error) -> WatchError {
    match e {
        kube::Error::Api(ref response) if response.code == 410 => WatchError::CursorExpired,
        other => WatchError::Api(other),
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;

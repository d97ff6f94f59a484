// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! cds-cluster: the cluster-facing seam.
//!
//! [`bootstrap`] covers the configuration ladder (in-cluster first, then
//! an external kubeconfig) and namespace discovery. [`api`] is the
//! narrow operation set the responder needs, behind a trait so handlers
//! can be tested against a recording fake.

pub mod api;
pub mod bootstrap;

pub use api::{ClusterApi, ClusterError, JobRef, KubeCluster};
pub use bootstrap::{cluster_client, current_namespace, NamespaceError};

#[cfg(any(test, feature = "test-support"))]
pub use api::{CreatedJob, FakeCluster};

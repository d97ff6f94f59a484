// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Guardian News & Media Ltd

//! The narrow set of cluster operations the responder performs, behind a
//! trait so handlers can run against a recording fake in tests.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, ListParams, LogParams, PostParams, PropagationPolicy};
use kube::Client;
use thiserror::Error;
use tracing::debug;

/// Errors from cluster operations.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("cluster API error: {0}")]
    Api(#[from] kube::Error),

    #[error("created job has no {0} in its metadata")]
    IncompleteMetadata(&'static str),
}

/// Identity of a submitted job, as assigned by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRef {
    pub uid: String,
    pub name: String,
    pub namespace: String,
}

/// Cluster operations used by the launch and cleanup handlers.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Submit a job and return the identity the cluster assigned it.
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<JobRef, ClusterError>;

    /// Delete a job with foreground propagation, taking its pods with it.
    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClusterError>;

    /// Names of the pods belonging to a job, via the `job-name` label the
    /// job controller stamps onto them.
    async fn list_job_pods(
        &self,
        namespace: &str,
        job_name: &str,
    ) -> Result<Vec<String>, ClusterError>;

    /// Full log text of a pod's primary container.
    async fn pod_log(&self, namespace: &str, pod_name: &str) -> Result<String, ClusterError>;
}

/// Live implementation over a kube client.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn create_job(&self, namespace: &str, job: &Job) -> Result<JobRef, ClusterError> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let created = jobs.create(&PostParams::default(), job).await?;
        let uid = created.metadata.uid.ok_or(ClusterError::IncompleteMetadata("uid"))?;
        let name = created.metadata.name.ok_or(ClusterError::IncompleteMetadata("name"))?;
        let namespace = created
            .metadata
            .namespace
            .ok_or(ClusterError::IncompleteMetadata("namespace"))?;
        Ok(JobRef { uid, name, namespace })
    }

    async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
        let jobs: Api<Job> = Api::namespaced(self.client.clone(), namespace);
        let params = DeleteParams {
            propagation_policy: Some(PropagationPolicy::Foreground),
            ..Default::default()
        };
        jobs.delete(name, &params).await?;
        Ok(())
    }

    async fn list_job_pods(
        &self,
        namespace: &str,
        job_name: &str,
    ) -> Result<Vec<String>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(&format!("job-name={job_name}"));
        let list = pods.list(&params).await?;
        Ok(list.items.into_iter().filter_map(|p| p.metadata.name).collect())
    }

    async fn pod_log(&self, namespace: &str, pod_name: &str) -> Result<String, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let log = pods.logs(pod_name, &LogParams::default()).await?;
        debug!(pod = pod_name, namespace, bytes = log.len(), "downloaded pod log");
        Ok(log)
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{ClusterApi, ClusterError, JobRef};
    use async_trait::async_trait;
    use k8s_openapi::api::batch::v1::Job;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// A job submitted to the fake, with the ref it was assigned.
    #[derive(Debug, Clone)]
    pub struct CreatedJob {
        pub namespace: String,
        pub job: Job,
        pub assigned: JobRef,
    }

    #[derive(Default)]
    struct FakeClusterState {
        created: Vec<CreatedJob>,
        deleted: Vec<(String, String)>,
        pods: HashMap<String, Vec<String>>,
        logs: HashMap<String, String>,
        fail_create: Option<String>,
        fail_delete: Option<String>,
        fail_logs: Option<String>,
    }

    /// Recording fake for handler tests.
    #[derive(Clone, Default)]
    pub struct FakeCluster {
        inner: Arc<Mutex<FakeClusterState>>,
    }

    impl FakeCluster {
        pub fn new() -> Self {
            Self::default()
        }

        /// All jobs submitted so far.
        pub fn created(&self) -> Vec<CreatedJob> {
            self.inner.lock().created.clone()
        }

        /// All `(name, namespace)` pairs deleted so far.
        pub fn deleted(&self) -> Vec<(String, String)> {
            self.inner.lock().deleted.clone()
        }

        /// Register pods for a job name, with their logs.
        pub fn add_pod(&self, job_name: &str, pod_name: &str, log: &str) {
            let mut state = self.inner.lock();
            state.pods.entry(job_name.to_string()).or_default().push(pod_name.to_string());
            state.logs.insert(pod_name.to_string(), log.to_string());
        }

        /// Make the next `create_job` fail with the given message.
        pub fn fail_create(&self, message: &str) {
            self.inner.lock().fail_create = Some(message.to_string());
        }

        /// Make every `delete_job` fail with the given message.
        pub fn fail_delete(&self, message: &str) {
            self.inner.lock().fail_delete = Some(message.to_string());
        }

        /// Make every `pod_log` fail with the given message.
        pub fn fail_logs(&self, message: &str) {
            self.inner.lock().fail_logs = Some(message.to_string());
        }
    }

    fn fake_error(message: &str) -> ClusterError {
        ClusterError::Api(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: "TestInjected".to_string(),
            code: 500,
        }))
    }

    #[async_trait]
    impl ClusterApi for FakeCluster {
        async fn create_job(&self, namespace: &str, job: &Job) -> Result<JobRef, ClusterError> {
            let mut state = self.inner.lock();
            if let Some(message) = state.fail_create.take() {
                return Err(fake_error(&message));
            }
            let name = job.metadata.name.clone().unwrap_or_default();
            let assigned = JobRef {
                uid: format!("uid-{}", state.created.len() + 1),
                name: name.clone(),
                namespace: namespace.to_string(),
            };
            state.created.push(CreatedJob {
                namespace: namespace.to_string(),
                job: job.clone(),
                assigned: assigned.clone(),
            });
            Ok(assigned)
        }

        async fn delete_job(&self, name: &str, namespace: &str) -> Result<(), ClusterError> {
            let mut state = self.inner.lock();
            if let Some(message) = &state.fail_delete {
                let message = message.clone();
                return Err(fake_error(&message));
            }
            state.deleted.push((name.to_string(), namespace.to_string()));
            Ok(())
        }

        async fn list_job_pods(
            &self,
            _namespace: &str,
            job_name: &str,
        ) -> Result<Vec<String>, ClusterError> {
            Ok(self.inner.lock().pods.get(job_name).cloned().unwrap_or_default())
        }

        async fn pod_log(&self, _namespace: &str, pod_name: &str) -> Result<String, ClusterError> {
            let state = self.inner.lock();
            if let Some(message) = &state.fail_logs {
                return Err(fake_error(message));
            }
            Ok(state.logs.get(pod_name).cloned().unwrap_or_default())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{CreatedJob, FakeCluster};

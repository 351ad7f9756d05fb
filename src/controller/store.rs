//! # Cluster Store
//!
//! The object store the rotation workflow reads and writes: the `NewCA` request,
//! secrets and the istiod deployment.
//!
//! The trait keeps the workflow independent of the Kubernetes client so it can be
//! driven against an in-memory store in tests. Writes carry the
//! `resourceVersion` they were read at; the API server rejects stale writes with
//! 409, surfaced as [`StoreError::Conflict`].

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

use crate::constants::FIELD_MANAGER;
use crate::controller::error::StoreError;
use crate::crd::NewCA;

/// Object store operations used by the rotation workflow
#[async_trait]
pub trait ClusterStore: Send + Sync {
    /// Get a NewCA request
    async fn get_rotation_request(&self, name: &str, namespace: &str) -> Result<NewCA, StoreError>;

    /// Persist the status of a NewCA request read earlier
    ///
    /// Only the status is written. Fails with `Conflict` if the request changed
    /// since it was read.
    async fn update_rotation_status(&self, request: &NewCA) -> Result<NewCA, StoreError>;

    /// Get a secret
    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, StoreError>;

    /// Create a secret; fails with `Conflict` if it already exists
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replace a secret read earlier; fails with `Conflict` if it changed since
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Get a deployment
    async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, StoreError>;

    /// Replace a deployment read earlier; fails with `Conflict` if it changed since
    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, StoreError>;
}

/// Name and namespace of an object about to be written
///
/// # Errors
///
/// Returns `StoreError::Invalid` if either is unset.
pub fn object_key(meta: &ObjectMeta, kind: &'static str) -> Result<(String, String), StoreError> {
    let name = meta.name.clone().ok_or_else(|| StoreError::Invalid {
        kind,
        reason: "metadata.name is not set".to_string(),
    })?;
    let namespace = meta.namespace.clone().ok_or_else(|| StoreError::Invalid {
        kind,
        reason: format!("metadata.namespace is not set for {name}"),
    })?;
    Ok((name, namespace))
}

/// [`ClusterStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_rotation_request(&self, name: &str, namespace: &str) -> Result<NewCA, StoreError> {
        let api: Api<NewCA> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "NewCA", namespace, name))
    }

    async fn update_rotation_status(&self, request: &NewCA) -> Result<NewCA, StoreError> {
        let (name, namespace) = object_key(&request.metadata, "NewCA")?;
        let api: Api<NewCA> = Api::namespaced(self.client.clone(), &namespace);

        // resourceVersion in a merge patch acts as a precondition
        let patch = serde_json::json!({
            "metadata": { "resourceVersion": request.metadata.resource_version },
            "status": request.status,
        });
        debug!(newca = %name, namespace = %namespace, "Patching NewCA status");

        api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await
            .map_err(|e| StoreError::from_kube(e, "NewCA", &namespace, &name))
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (name, namespace) = object_key(&secret.metadata, "Secret")?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", &namespace, &name))
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (name, namespace) = object_key(&secret.metadata, "Secret")?;
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), secret)
            .await
            .map_err(|e| StoreError::from_kube(e, "Secret", &namespace, &name))
    }

    async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, StoreError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| StoreError::from_kube(e, "Deployment", namespace, name))
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, StoreError> {
        let (name, namespace) = object_key(&deployment.metadata, "Deployment")?;
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), &namespace);
        api.replace(&name, &PostParams::default(), deployment)
            .await
            .map_err(|e| StoreError::from_kube(e, "Deployment", &namespace, &name))
    }
}

//! In-memory `ClusterStore` for driving the rotation workflow in tests
//!
//! Every write carries optimistic concurrency: a replace whose resourceVersion
//! differs from the stored one fails with `Conflict`, as the API server would.
//! Reads and writes are recorded so tests can assert on side effects, and
//! individual operations can be made to fail.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{PodTemplateSpec, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use newca_controller::constants::{
    ISTIOD_DEPLOYMENT_NAME, ISTIO_NAMESPACE, NEW_CA_NAME, NEW_CA_NAMESPACE, RESTARTED_AT_ANNOTATION,
};
use newca_controller::controller::engine::RotationEngine;
use newca_controller::controller::error::StoreError;
use newca_controller::controller::store::{object_key, ClusterStore};
use newca_controller::crd::{NewCA, NewCASpec, NewCAStatus, RotationState};

type Key = (String, String);

fn key(name: &str, namespace: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// Another writer replacing a secret in `istio-system` right after the
/// controller read `after_reading`
#[derive(Debug, Clone)]
pub struct ConcurrentWrite {
    pub after_reading: String,
    pub secret: String,
    pub entries: Vec<(String, String)>,
}

impl ConcurrentWrite {
    pub fn new(after_reading: &str, secret: &str, entries: &[(&str, &str)]) -> Self {
        Self {
            after_reading: after_reading.to_string(),
            secret: secret.to_string(),
            entries: entries
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }
}

/// Operations that can be made to fail or race
#[derive(Debug, Default, Clone)]
pub struct Faults {
    /// Secret create/replace fails with a 500
    pub secret_write_error: bool,
    /// Secret create/replace fails with `Conflict` this many times
    pub secret_write_conflicts: u32,
    /// Deployment replace fails with a 500
    pub deployment_write_error: bool,
    /// Deployment replace fails with `Conflict` this many times
    pub deployment_write_conflicts: u32,
    /// Status writes fail with a 500
    pub status_write_error: bool,
    /// Status writes of this state fail with a 500
    pub status_write_error_for: Option<RotationState>,
    /// NewCA reads fail with this status code
    pub request_read_error: Option<u16>,
    /// Secret reads of this name fail with a 500
    pub secret_read_error_for: Option<String>,
    /// Applied once, after the matching secret read
    pub concurrent_write: Option<ConcurrentWrite>,
    /// The NewCA request is deleted once istiod has been restarted
    pub delete_request_after_restart: bool,
    /// Deployment reads take this long
    pub deployment_read_delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct State {
    requests: BTreeMap<Key, NewCA>,
    secrets: BTreeMap<Key, Secret>,
    deployments: BTreeMap<Key, Deployment>,
    version: u64,
    reads: Vec<String>,
    writes: Vec<String>,
    status_history: Vec<RotationState>,
    faults: Faults,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

#[derive(Debug, Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

fn not_found(kind: &'static str, name: &str, namespace: &str) -> StoreError {
    StoreError::from_status(404, "not found".to_string(), kind, namespace, name)
}

fn conflict(kind: &'static str, name: &str, namespace: &str) -> StoreError {
    StoreError::from_status(409, "conflict".to_string(), kind, namespace, name)
}

fn server_error(kind: &'static str, name: &str, namespace: &str) -> StoreError {
    StoreError::from_status(500, "injected failure".to_string(), kind, namespace, name)
}

fn secret_object(name: &str, namespace: &str, version: String, entries: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            resource_version: Some(version),
            ..Default::default()
        },
        data: Some(data(entries)),
        ..Default::default()
    }
}

/// Secret data from string pairs
pub fn data(entries: &[(&str, &str)]) -> BTreeMap<String, ByteString> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
        .collect()
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Add a NewCA request pointing at `secret` in `secret_namespace`
    pub fn put_request(&self, name: &str, namespace: &str, secret: &str, secret_namespace: &str) {
        let mut request = NewCA::new(
            name,
            NewCASpec {
                secret: secret.to_string(),
                namespace: secret_namespace.to_string(),
            },
        );
        request.metadata.namespace = Some(namespace.to_string());
        let mut state = self.lock();
        request.metadata.resource_version = Some(state.next_version());
        state.requests.insert(key(name, namespace), request);
    }

    /// Add the singleton `new-ca` request
    pub fn put_singleton_request(&self, secret: &str, secret_namespace: &str) {
        self.put_request(NEW_CA_NAME, NEW_CA_NAMESPACE, secret, secret_namespace);
    }

    pub fn set_request_state(&self, state: RotationState) {
        let mut guard = self.lock();
        if let Some(request) = guard.requests.get_mut(&key(NEW_CA_NAME, NEW_CA_NAMESPACE)) {
            request.status = Some(NewCAStatus { status: Some(state) });
        }
    }

    pub fn put_secret(&self, name: &str, namespace: &str, entries: &[(&str, &str)]) {
        let mut state = self.lock();
        let version = state.next_version();
        state
            .secrets
            .insert(key(name, namespace), secret_object(name, namespace, version, entries));
    }

    pub fn put_istiod(&self) {
        let mut state = self.lock();
        let deployment = Deployment {
            metadata: ObjectMeta {
                name: Some(ISTIOD_DEPLOYMENT_NAME.to_string()),
                namespace: Some(ISTIO_NAMESPACE.to_string()),
                resource_version: Some(state.next_version()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec::default(),
                ..Default::default()
            }),
            ..Default::default()
        };
        state
            .deployments
            .insert(key(ISTIOD_DEPLOYMENT_NAME, ISTIO_NAMESPACE), deployment);
    }

    pub fn set_faults(&self, faults: Faults) {
        self.lock().faults = faults;
    }

    /// Secret data as strings, `None` if the secret does not exist
    pub fn secret_data(&self, name: &str, namespace: &str) -> Option<BTreeMap<String, String>> {
        self.lock().secrets.get(&key(name, namespace)).map(|secret| {
            secret
                .data
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| (k, String::from_utf8(v.0).unwrap()))
                .collect()
        })
    }

    pub fn secret_version(&self, name: &str, namespace: &str) -> Option<String> {
        self.lock()
            .secrets
            .get(&key(name, namespace))
            .and_then(|secret| secret.metadata.resource_version.clone())
    }

    pub fn has_request(&self) -> bool {
        self.lock()
            .requests
            .contains_key(&key(NEW_CA_NAME, NEW_CA_NAMESPACE))
    }

    pub fn request_state(&self) -> Option<RotationState> {
        self.lock()
            .requests
            .get(&key(NEW_CA_NAME, NEW_CA_NAMESPACE))
            .and_then(NewCA::rotation_state)
    }

    /// Every state persisted to the request, in order
    pub fn status_history(&self) -> Vec<RotationState> {
        self.lock().status_history.clone()
    }

    /// Value of the istiod restart annotation
    pub fn restarted_at(&self) -> Option<String> {
        self.lock()
            .deployments
            .get(&key(ISTIOD_DEPLOYMENT_NAME, ISTIO_NAMESPACE))
            .and_then(|d| d.spec.as_ref())
            .and_then(|s| s.template.metadata.as_ref())
            .and_then(|m| m.annotations.as_ref())
            .and_then(|a| a.get(RESTARTED_AT_ANNOTATION).cloned())
    }

    pub fn restart_count(&self) -> usize {
        self.writes().iter().filter(|w| w.starts_with("replace Deployment")).count()
    }

    pub fn secret_write_count(&self) -> usize {
        self.writes()
            .iter()
            .filter(|w| w.starts_with("create Secret") || w.starts_with("replace Secret"))
            .count()
    }

    pub fn reads(&self) -> Vec<String> {
        self.lock().reads.clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.lock().writes.clone()
    }

    pub fn clear_log(&self) {
        let mut state = self.lock();
        state.reads.clear();
        state.writes.clear();
        state.status_history.clear();
    }
}

#[async_trait]
impl ClusterStore for FakeStore {
    async fn get_rotation_request(&self, name: &str, namespace: &str) -> Result<NewCA, StoreError> {
        let mut state = self.lock();
        state.reads.push(format!("get NewCA {namespace}/{name}"));
        if let Some(code) = state.faults.request_read_error {
            return Err(StoreError::from_status(
                code,
                "injected failure".to_string(),
                "NewCA",
                namespace,
                name,
            ));
        }
        state
            .requests
            .get(&key(name, namespace))
            .cloned()
            .ok_or_else(|| not_found("NewCA", name, namespace))
    }

    async fn update_rotation_status(&self, request: &NewCA) -> Result<NewCA, StoreError> {
        let (name, namespace) = object_key(&request.metadata, "NewCA")?;
        let mut state = self.lock();
        let target = request.rotation_state();
        if state.faults.status_write_error
            || (target.is_some() && state.faults.status_write_error_for == target)
        {
            return Err(server_error("NewCA", &name, &namespace));
        }
        let version = state.next_version();
        let stored = state
            .requests
            .get_mut(&key(&name, &namespace))
            .ok_or_else(|| not_found("NewCA", &name, &namespace))?;
        if stored.metadata.resource_version != request.metadata.resource_version {
            return Err(conflict("NewCA", &name, &namespace));
        }
        stored.status.clone_from(&request.status);
        stored.metadata.resource_version = Some(version);
        let updated = stored.clone();
        state.writes.push(format!("status NewCA {namespace}/{name}"));
        if let Some(target) = target {
            state.status_history.push(target);
        }
        Ok(updated)
    }

    async fn get_secret(&self, name: &str, namespace: &str) -> Result<Secret, StoreError> {
        let mut state = self.lock();
        state.reads.push(format!("get Secret {namespace}/{name}"));
        if state.faults.secret_read_error_for.as_deref() == Some(name) {
            return Err(server_error("Secret", name, namespace));
        }
        let found = state
            .secrets
            .get(&key(name, namespace))
            .cloned()
            .ok_or_else(|| not_found("Secret", name, namespace));

        let races = state
            .faults
            .concurrent_write
            .as_ref()
            .is_some_and(|write| write.after_reading == name);
        if let Some(write) = state.faults.concurrent_write.take_if(|_| races) {
            let entries: Vec<(&str, &str)> = write
                .entries
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let version = state.next_version();
            let secret = secret_object(&write.secret, ISTIO_NAMESPACE, version, &entries);
            state.secrets.insert(key(&write.secret, ISTIO_NAMESPACE), secret);
        }
        found
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (name, namespace) = object_key(&secret.metadata, "Secret")?;
        let mut state = self.lock();
        if state.faults.secret_write_error {
            return Err(server_error("Secret", &name, &namespace));
        }
        if state.faults.secret_write_conflicts > 0 {
            state.faults.secret_write_conflicts -= 1;
            return Err(conflict("Secret", &name, &namespace));
        }
        if state.secrets.contains_key(&key(&name, &namespace)) {
            return Err(conflict("Secret", &name, &namespace));
        }
        let mut created = secret.clone();
        created.metadata.resource_version = Some(state.next_version());
        state.secrets.insert(key(&name, &namespace), created.clone());
        state.writes.push(format!("create Secret {namespace}/{name}"));
        Ok(created)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let (name, namespace) = object_key(&secret.metadata, "Secret")?;
        let mut state = self.lock();
        if state.faults.secret_write_error {
            return Err(server_error("Secret", &name, &namespace));
        }
        if state.faults.secret_write_conflicts > 0 {
            state.faults.secret_write_conflicts -= 1;
            return Err(conflict("Secret", &name, &namespace));
        }
        let version = state.next_version();
        let stored = state
            .secrets
            .get_mut(&key(&name, &namespace))
            .ok_or_else(|| not_found("Secret", &name, &namespace))?;
        if stored.metadata.resource_version != secret.metadata.resource_version {
            return Err(conflict("Secret", &name, &namespace));
        }
        let mut replaced = secret.clone();
        replaced.metadata.resource_version = Some(version);
        *stored = replaced.clone();
        state.writes.push(format!("replace Secret {namespace}/{name}"));
        Ok(replaced)
    }

    async fn get_deployment(&self, name: &str, namespace: &str) -> Result<Deployment, StoreError> {
        let delay = {
            let mut state = self.lock();
            state.reads.push(format!("get Deployment {namespace}/{name}"));
            state.faults.deployment_read_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.lock();
        state
            .deployments
            .get(&key(name, namespace))
            .cloned()
            .ok_or_else(|| not_found("Deployment", name, namespace))
    }

    async fn replace_deployment(&self, deployment: &Deployment) -> Result<Deployment, StoreError> {
        let (name, namespace) = object_key(&deployment.metadata, "Deployment")?;
        let mut state = self.lock();
        if state.faults.deployment_write_error {
            return Err(server_error("Deployment", &name, &namespace));
        }
        if state.faults.deployment_write_conflicts > 0 {
            state.faults.deployment_write_conflicts -= 1;
            return Err(conflict("Deployment", &name, &namespace));
        }
        let version = state.next_version();
        let stored = state
            .deployments
            .get_mut(&key(&name, &namespace))
            .ok_or_else(|| not_found("Deployment", &name, &namespace))?;
        if stored.metadata.resource_version != deployment.metadata.resource_version {
            return Err(conflict("Deployment", &name, &namespace));
        }
        let mut replaced = deployment.clone();
        replaced.metadata.resource_version = Some(version);
        *stored = replaced.clone();
        state.writes.push(format!("replace Deployment {namespace}/{name}"));
        if state.faults.delete_request_after_restart {
            state.requests.remove(&key(NEW_CA_NAME, NEW_CA_NAMESPACE));
        }
        Ok(replaced)
    }
}

/// Engine over a shared fake store
pub fn engine(store: &Arc<FakeStore>) -> RotationEngine {
    let store: Arc<dyn ClusterStore> = Arc::clone(store) as Arc<dyn ClusterStore>;
    RotationEngine::new(store)
}

//! Leader election using Kubernetes Leases
//!
//! Only the replica holding the `coordination.k8s.io/v1` Lease runs the
//! controller, so at most one rotation is in flight cluster-wide.
//!
//! # Atomicity
//!
//! Uses resourceVersion for compare-and-swap semantics. If the lease changes
//! between read and write, the write fails with 409 Conflict and the attempt
//! is treated as "not leader".

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{MicroTime, ObjectMeta};
use kube::api::{Api, PostParams};
use kube::Client;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// Timing constants
const LEASE_DURATION: Duration = Duration::from_secs(15);
const RENEW_INTERVAL: Duration = Duration::from_secs(5);
const RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Leader election errors
#[derive(Debug, Error)]
pub enum LeaderElectionError {
    /// Kubernetes API error
    #[error("kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("lease {0} has no resourceVersion")]
    MissingResourceVersion(String),
}

/// What to do with the lease as currently observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseAction {
    /// No lease exists yet
    Create,
    /// We hold it
    Renew,
    /// Held by someone else but expired
    TakeOver { transitions: i32 },
    /// Held by someone else and live
    Wait,
}

/// Decide how to act on `lease` as `identity` at time `now`
#[must_use]
pub fn decide_lease_action(lease: Option<&Lease>, identity: &str, now: DateTime<Utc>) -> LeaseAction {
    let Some(lease) = lease else {
        return LeaseAction::Create;
    };
    let spec = lease.spec.as_ref();
    if spec.and_then(|s| s.holder_identity.as_deref()) == Some(identity) {
        return LeaseAction::Renew;
    }

    let renew_time = spec.and_then(|s| s.renew_time.as_ref()).and_then(from_micro_time);
    let duration_secs = spec.and_then(|s| s.lease_duration_seconds);
    let is_expired = match (renew_time, duration_secs) {
        (Some(rt), Some(duration)) => now > rt + chrono::Duration::seconds(i64::from(duration)),
        _ => true,
    };

    if is_expired {
        LeaseAction::TakeOver {
            transitions: spec.and_then(|s| s.lease_transitions).unwrap_or(0),
        }
    } else {
        LeaseAction::Wait
    }
}

/// `MicroTime` at `at`, built from its RFC 3339 wire form
#[must_use]
pub fn to_micro_time(at: DateTime<Utc>) -> Option<MicroTime> {
    let wire = at.to_rfc3339_opts(SecondsFormat::Micros, true);
    serde_json::from_value(serde_json::Value::String(wire)).ok()
}

fn from_micro_time(time: &MicroTime) -> Option<DateTime<Utc>> {
    let wire = serde_json::to_value(time).ok()?;
    DateTime::parse_from_rfc3339(wire.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Leader elector using Kubernetes Leases
pub struct LeaderElector {
    client: Client,
    lease_name: String,
    namespace: String,
    identity: String,
    lease_duration: Duration,
    renew_interval: Duration,
    retry_interval: Duration,
}

impl std::fmt::Debug for LeaderElector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderElector")
            .field("lease_name", &self.lease_name)
            .field("namespace", &self.namespace)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl LeaderElector {
    /// Create a new leader elector (15s lease, 5s renew, 2s retry)
    #[must_use]
    pub fn new(client: Client, lease_name: &str, namespace: &str, identity: &str) -> Self {
        Self {
            client,
            lease_name: lease_name.to_string(),
            namespace: namespace.to_string(),
            identity: identity.to_string(),
            lease_duration: LEASE_DURATION,
            renew_interval: RENEW_INTERVAL,
            retry_interval: RETRY_INTERVAL,
        }
    }

    /// Block until leadership is acquired, then return a guard
    ///
    /// The guard keeps renewing the lease; [`LeaderGuard::lost`] resolves when
    /// a renewal fails.
    ///
    /// # Errors
    ///
    /// Never in practice: transient API errors are logged and retried.
    pub async fn acquire(self: Arc<Self>) -> Result<LeaderGuard, LeaderElectionError> {
        info!(
            identity = %self.identity,
            lease = %self.lease_name,
            namespace = %self.namespace,
            "Waiting for leadership..."
        );

        loop {
            match self.try_acquire_or_renew().await {
                Ok(true) => {
                    info!(identity = %self.identity, "Leadership acquired");
                    return Ok(self.create_guard());
                }
                Ok(false) => {
                    debug!(identity = %self.identity, "Lease held by another, waiting...");
                }
                Err(e) => {
                    warn!(
                        identity = %self.identity,
                        error = %e,
                        retry_secs = self.retry_interval.as_secs(),
                        "Failed to acquire lease, retrying..."
                    );
                }
            }
            tokio::time::sleep(self.retry_interval).await;
        }
    }

    fn create_guard(self: &Arc<Self>) -> LeaderGuard {
        let (lost_tx, lost_rx) = oneshot::channel();
        let elector = Arc::clone(self);
        let renewal_task = tokio::spawn(async move {
            elector.renewal_loop(lost_tx).await;
        });

        LeaderGuard {
            identity: self.identity.clone(),
            renewal_task,
            lost_rx: Some(lost_rx),
        }
    }

    async fn try_acquire_or_renew(&self) -> Result<bool, LeaderElectionError> {
        let api: Api<Lease> = Api::namespaced(self.client.clone(), &self.namespace);
        let now = Utc::now();

        let existing = match api.get(&self.lease_name).await {
            Ok(lease) => Some(lease),
            Err(kube::Error::Api(e)) if e.code == 404 => None,
            Err(e) => return Err(e.into()),
        };

        let lease = match decide_lease_action(existing.as_ref(), &self.identity, now) {
            LeaseAction::Wait => return Ok(false),
            LeaseAction::Create => self.lease_object(None, now, 0),
            LeaseAction::Renew => {
                let mut lease = existing.unwrap_or_default();
                self.resource_version(&lease)?;
                if let Some(spec) = lease.spec.as_mut() {
                    spec.renew_time = to_micro_time(now);
                }
                lease
            }
            LeaseAction::TakeOver { transitions } => {
                let current = existing.unwrap_or_default();
                let rv = self.resource_version(&current)?;
                self.lease_object(Some(rv), now, transitions + 1)
            }
        };

        let result = if lease.metadata.resource_version.is_none() {
            api.create(&PostParams::default(), &lease).await
        } else {
            api.replace(&self.lease_name, &PostParams::default(), &lease).await
        };

        match result {
            Ok(_) => {
                debug!(identity = %self.identity, "Lease written");
                Ok(true)
            }
            Err(kube::Error::Api(e)) if e.code == 409 => {
                debug!(identity = %self.identity, "Lease write conflict");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resource_version(&self, lease: &Lease) -> Result<String, LeaderElectionError> {
        lease
            .metadata
            .resource_version
            .clone()
            .ok_or_else(|| LeaderElectionError::MissingResourceVersion(self.lease_name.clone()))
    }

    fn lease_object(&self, resource_version: Option<String>, now: DateTime<Utc>, transitions: i32) -> Lease {
        Lease {
            metadata: ObjectMeta {
                name: Some(self.lease_name.clone()),
                namespace: Some(self.namespace.clone()),
                resource_version,
                ..Default::default()
            },
            spec: Some(LeaseSpec {
                holder_identity: Some(self.identity.clone()),
                lease_duration_seconds: Some(
                    i32::try_from(self.lease_duration.as_secs()).unwrap_or(i32::MAX),
                ),
                acquire_time: to_micro_time(now),
                renew_time: to_micro_time(now),
                lease_transitions: Some(transitions),
                ..Default::default()
            }),
        }
    }

    async fn renewal_loop(&self, lost_tx: oneshot::Sender<()>) {
        loop {
            tokio::time::sleep(self.renew_interval).await;

            match self.try_acquire_or_renew().await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(identity = %self.identity, "Leadership lost");
                    let _ = lost_tx.send(());
                    return;
                }
                Err(e) => {
                    warn!(identity = %self.identity, error = %e, "Lease renewal failed, leadership lost");
                    let _ = lost_tx.send(());
                    return;
                }
            }
        }
    }
}

/// Guard that maintains leadership
///
/// The renewal task is aborted when the guard is dropped.
#[derive(Debug)]
pub struct LeaderGuard {
    identity: String,
    renewal_task: JoinHandle<()>,
    lost_rx: Option<oneshot::Receiver<()>>,
}

impl LeaderGuard {
    /// Wait until leadership is lost
    pub async fn lost(&mut self) {
        if let Some(rx) = self.lost_rx.take() {
            let _ = rx.await;
        }
    }
}

impl Drop for LeaderGuard {
    fn drop(&mut self) {
        self.renewal_task.abort();
        info!(identity = %self.identity, "Leadership released");
    }
}

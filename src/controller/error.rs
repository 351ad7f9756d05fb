//! # Errors
//!
//! Store faults and rotation failures.
//!
//! `StoreError` keeps "not found" distinct from every other fault so callers can
//! suppress absence without masking transport or permission errors.

use thiserror::Error;

/// Errors returned by a [`ClusterStore`](crate::controller::store::ClusterStore)
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The object changed since it was read (optimistic concurrency)
    #[error("{kind} {namespace}/{name} was modified concurrently")]
    Conflict {
        kind: &'static str,
        namespace: String,
        name: String,
    },

    /// The API server rejected the request
    #[error("API server rejected {kind} {namespace}/{name} ({code}): {message}")]
    Api {
        kind: &'static str,
        namespace: String,
        name: String,
        code: u16,
        message: String,
    },

    /// The object is missing fields required to address it
    #[error("invalid {kind} object: {reason}")]
    Invalid { kind: &'static str, reason: String },

    /// Transport or client fault
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    /// Classify a `kube::Error` for the object it addressed
    #[must_use]
    pub fn from_kube(error: kube::Error, kind: &'static str, namespace: &str, name: &str) -> Self {
        match error {
            kube::Error::Api(response) => Self::from_status(
                response.code,
                response.message.clone(),
                kind,
                namespace,
                name,
            ),
            other => Self::Kube(other),
        }
    }

    /// Classify an API server status code
    #[must_use]
    pub fn from_status(
        code: u16,
        message: String,
        kind: &'static str,
        namespace: &str,
        name: &str,
    ) -> Self {
        let namespace = namespace.to_string();
        let name = name.to_string();
        match code {
            404 => Self::NotFound {
                kind,
                namespace,
                name,
            },
            409 => Self::Conflict {
                kind,
                namespace,
                name,
            },
            _ => Self::Api {
                kind,
                namespace,
                name,
                code,
                message,
            },
        }
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Terminal failures of one rotation invocation
///
/// Each variant names the step that failed. All of them end the invocation in
/// the `Failure` state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RotationError {
    /// The secret referenced by the NewCA spec does not exist
    #[error("new CA secret {namespace}/{name} not found")]
    SourceNotFound { namespace: String, name: String },

    /// Neither the canonical nor the legacy trust anchor exists
    #[error("no trust anchor secret found: neither {canonical} nor {legacy} exists in {namespace}")]
    DestinationNotFound {
        namespace: String,
        canonical: String,
        legacy: String,
    },

    /// The new CA secret lacks required material
    #[error("invalid new secret {namespace}/{name}: missing {}", .missing.join(", "))]
    InvalidSource {
        namespace: String,
        name: String,
        missing: Vec<&'static str>,
    },

    /// The new CA secret lacks a key the comparison needs
    #[error("invalid certificate data: new secret has no {key}")]
    SourceMissingKey { key: &'static str },

    /// The trust anchor lacks a key the comparison needs
    #[error("invalid certificate data: trust anchor has no {key}")]
    DestinationMissingKey { key: &'static str },

    /// Persisting the new trust anchor failed
    #[error("failed to update trust anchor secret: {0}")]
    TrustStoreWrite(#[source] StoreError),

    /// Bumping the istiod restart annotation failed
    #[error("failed to restart control plane: {0}")]
    Restart(#[source] StoreError),

    /// Persisting the NewCA status failed
    #[error("failed to set rotation status: {0}")]
    Status(#[source] StoreError),

    /// Any other store fault while reading state
    #[error(transparent)]
    Store(#[from] StoreError),
}

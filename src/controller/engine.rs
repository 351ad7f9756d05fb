//! # Rotation Engine
//!
//! Drives one rotation invocation for the NewCA request to a terminal state.
//!
//! ```text
//! fetch request ─▶ resolve source ─▶ resolve trust anchor ─▶ validate source
//!                                                                   │
//!          ┌──────────────── compare leaf and root ◀────────────────┘
//!          │
//!          ├─ leaf equal ─────────────▶ Complete
//!          ├─ root changed ───────────▶ Complete (nothing written)
//!          └─ rotate ─▶ In progress ─▶ write cacerts ─▶ restart istiod ─▶ Complete
//! ```
//!
//! Every failure exit records `Failure` on a best-effort basis and returns the
//! fault that caused it. Nothing is carried between invocations except the
//! stored status and secret contents, so a re-invocation re-derives everything.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::controller::error::RotationError;
use crate::controller::policy::{decide_rotation, RotationDecision};
use crate::controller::resolver::{resolve_destination, resolve_source};
use crate::controller::restart::restart_istiod;
use crate::controller::status::set_rotation_state;
use crate::controller::store::ClusterStore;
use crate::controller::trust_store::install_trust_anchor;
use crate::controller::validation::{is_ca_valid, is_runtime_valid, missing_keys, CA_REQUIRED_KEYS};
use crate::crd::{NewCA, RotationState};
use crate::observability::metrics;

/// How a successful invocation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationOutcome {
    /// Request absent or not the singleton identity; nothing was touched
    Ignored,
    /// The trust anchor already holds the new CA certificate
    AlreadyCurrent,
    /// The root certificate differs; root rotation is not supported
    RootChanged,
    /// New material installed and istiod restarted
    Rotated,
}

impl RotationOutcome {
    /// Metric label
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::AlreadyCurrent => "already_current",
            Self::RootChanged => "root_changed",
            Self::Rotated => "rotated",
        }
    }
}

/// Runs rotation invocations against a [`ClusterStore`]
#[derive(Clone)]
pub struct RotationEngine {
    store: Arc<dyn ClusterStore>,
}

impl std::fmt::Debug for RotationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotationEngine").finish_non_exhaustive()
    }
}

impl RotationEngine {
    #[must_use]
    pub fn new(store: Arc<dyn ClusterStore>) -> Self {
        Self { store }
    }

    /// Run one invocation for the NewCA identified by `name`/`namespace`
    ///
    /// # Errors
    ///
    /// The fault that ended the invocation in `Failure`, a failed final status
    /// write, or a store fault other than "not found" while reading the request.
    pub async fn run(&self, name: &str, namespace: &str) -> Result<RotationOutcome, RotationError> {
        if !NewCA::is_singleton_identity(name, namespace) {
            info!(newca = name, namespace, "NewCA in wrong place, ignoring");
            return Ok(RotationOutcome::Ignored);
        }

        let request = match self.store.get_rotation_request(name, namespace).await {
            Ok(request) => request,
            Err(e) if e.is_not_found() => {
                info!(newca = name, namespace, "NewCA not found, ignoring");
                return Ok(RotationOutcome::Ignored);
            }
            Err(e) => return Err(e.into()),
        };

        let outcome = match self.rotate(&request, name, namespace).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(newca = name, namespace, error = %e, "CA rotation failed");
                self.record_failure(name, namespace).await;
                return Err(e);
            }
        };

        self.set_state(name, namespace, RotationState::Complete).await?;
        Ok(outcome)
    }

    /// Steps between reading the request and the final `Complete` write
    async fn rotate(
        &self,
        request: &NewCA,
        name: &str,
        namespace: &str,
    ) -> Result<RotationOutcome, RotationError> {
        let store = self.store.as_ref();

        let (source_name, source_namespace) = request.source_ref();
        let source = resolve_source(store, source_name, source_namespace)
            .await
            .inspect_err(|e| {
                warn!(secret = source_name, namespace = source_namespace, error = %e, "Failed to find new secret");
            })?;

        let destination = resolve_destination(store).await.inspect_err(|e| {
            warn!(error = %e, "Failed to find current CA secret");
        })?;
        if !is_runtime_valid(&destination.secret) {
            warn!(
                source = ?destination.source,
                "Current CA secret is missing CA certificate or key"
            );
        }

        if !is_ca_valid(&source) {
            let missing = missing_keys(&source, &CA_REQUIRED_KEYS);
            warn!(
                secret = source_name,
                namespace = source_namespace,
                missing = ?missing,
                "Invalid new secret"
            );
            return Err(RotationError::InvalidSource {
                namespace: source_namespace.to_string(),
                name: source_name.to_string(),
                missing,
            });
        }

        match decide_rotation(&source, &destination.secret)? {
            RotationDecision::AlreadyCurrent => {
                info!(secret = source_name, "CA certificate already installed, nothing to do");
                return Ok(RotationOutcome::AlreadyCurrent);
            }
            RotationDecision::RootChanged => {
                warn!(secret = source_name, "Root cert changed, rotation not supported");
                return Ok(RotationOutcome::RootChanged);
            }
            RotationDecision::Rotate => {}
        }

        info!(
            secret = source_name,
            namespace = source_namespace,
            trust_anchor_existed = destination.existed,
            "Rotating intermediate CA"
        );
        self.set_state(name, namespace, RotationState::InProgress).await?;

        install_trust_anchor(store, &source, &destination)
            .await
            .map_err(RotationError::TrustStoreWrite)?;

        restart_istiod(store).await.map_err(RotationError::Restart)?;
        metrics::increment_control_plane_restarts();

        Ok(RotationOutcome::Rotated)
    }

    async fn set_state(&self, name: &str, namespace: &str, state: RotationState) -> Result<(), RotationError> {
        match set_rotation_state(self.store.as_ref(), name, namespace, state).await {
            Ok(_) => Ok(()),
            Err(e) => {
                metrics::increment_status_write_failures();
                Err(RotationError::Status(e))
            }
        }
    }

    /// Best-effort `Failure` write; its own fault is logged and dropped
    ///
    /// Also used by callers that abandon an invocation midway, such as on a
    /// timeout, so the request does not stay `In progress`.
    pub async fn record_failure(&self, name: &str, namespace: &str) {
        if !NewCA::is_singleton_identity(name, namespace) {
            return;
        }
        if let Err(e) = self.set_state(name, namespace, RotationState::Failure).await {
            warn!(newca = name, namespace, error = %e, "Failed to record rotation failure");
        }
    }
}

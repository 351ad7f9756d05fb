//! # Reconciler
//!
//! Adapts the [`RotationEngine`] to the `kube_runtime` controller.
//!
//! The controller calls [`reconcile`] at most once at a time per object, which is
//! the serialization the engine relies on. Each call is bounded by a timeout that
//! drops any outstanding API request. Failed calls are requeued by
//! [`crate::runtime::error_policy`] with a per-resource Fibonacci backoff that is
//! reset here on success.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kube::ResourceExt;
use kube_runtime::controller::Action;
use thiserror::Error;
use tracing::{debug, info, warn, Instrument};

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_RECONCILE_TIMEOUT_SECS,
};
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::engine::RotationEngine;
use crate::controller::error::RotationError;
use crate::crd::NewCA;
use crate::observability::metrics;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error("reconciliation of {namespace}/{name} timed out after {timeout:?}")]
    Timeout {
        namespace: String,
        name: String,
        timeout: Duration,
    },
}

/// Per-resource error backoff
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min, max),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.backoff.reset();
        self.error_count = 0;
    }
}

/// Timing knobs for the reconcile loop
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerSettings {
    /// Upper bound for one invocation
    pub timeout: Duration,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_RECONCILE_TIMEOUT_SECS),
            backoff_min: Duration::from_secs(DEFAULT_BACKOFF_MIN_SECS),
            backoff_max: Duration::from_secs(DEFAULT_BACKOFF_MAX_SECS),
        }
    }
}

/// Shared controller context
pub struct Reconciler {
    pub engine: RotationEngine,
    pub settings: ReconcilerSettings,
    /// Keyed by `namespace/name`
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(engine: RotationEngine, settings: ReconcilerSettings) -> Self {
        Self {
            engine,
            settings,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Advance the backoff for a resource and return the delay before its retry
    pub fn next_backoff(&self, key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| {
                    BackoffState::new(self.settings.backoff_min, self.settings.backoff_max)
                });
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
                (self.settings.backoff_min, 0)
            }
        }
    }

    /// Restart the backoff for a resource after a successful reconciliation
    pub fn reset_backoff(&self, key: &str) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                if let Some(state) = states.get_mut(key) {
                    if state.error_count > 0 {
                        debug!(resource = key, errors = state.error_count, "Reset error backoff");
                    }
                    state.reset();
                }
            }
            Err(e) => warn!("Failed to lock backoff_states: {}", e),
        }
    }
}

/// `namespace/name` of a NewCA
#[must_use]
pub fn resource_key(obj: &NewCA) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Reconcile one NewCA
///
/// # Errors
///
/// The rotation fault, or `Timeout` if the invocation exceeded its bound.
pub async fn reconcile(obj: Arc<NewCA>, ctx: Arc<Reconciler>) -> Result<Action, ReconcilerError> {
    let name = obj.name_any();
    let namespace = obj.namespace().unwrap_or_default();
    let span = tracing::info_span!("reconcile", newca = %name, namespace = %namespace);

    metrics::increment_reconciliations();
    let start = Instant::now();

    let timeout = ctx.settings.timeout;
    let result = tokio::time::timeout(timeout, ctx.engine.run(&name, &namespace).instrument(span)).await;
    metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            warn!(newca = %name, namespace = %namespace, ?timeout, "Reconciliation timed out");
            // The abandoned invocation may have left the request `In progress`
            if tokio::time::timeout(timeout, ctx.engine.record_failure(&name, &namespace))
                .await
                .is_err()
            {
                warn!(newca = %name, namespace = %namespace, "Timed out recording rotation failure");
            }
            return Err(ReconcilerError::Timeout {
                namespace,
                name,
                timeout,
            })
        }
    };

    metrics::increment_rotation_outcome(outcome.as_str());
    ctx.reset_backoff(&resource_key(&obj));
    info!(
        newca = %name,
        namespace = %namespace,
        outcome = outcome.as_str(),
        "Reconciliation finished"
    );
    Ok(Action::await_change())
}

//! # Error Policy
//!
//! Requeue policy for failed reconciliations and classification of watch stream
//! errors.

use std::sync::Arc;

use kube_runtime::controller::Action;
use tracing::{error, info, warn};

use crate::controller::reconciler::{resource_key, Reconciler, ReconcilerError};
use crate::crd::NewCA;
use crate::observability::metrics;

/// Requeue a failed NewCA with Fibonacci backoff
///
/// Backoff state is tracked per resource so one failing object does not slow
/// down another.
pub fn handle_reconciliation_error(obj: Arc<NewCA>, error: &ReconcilerError, ctx: Arc<Reconciler>) -> Action {
    let key = resource_key(&obj);
    metrics::increment_reconciliation_errors();

    let (delay, error_count) = ctx.next_backoff(&key);
    error!(resource = %key, error = %error, error_count, "Reconciliation error");

    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        resource = %key,
        delay_secs = delay.as_secs(),
        next_retry = %next_trigger_time.to_rfc3339(),
        "Retrying with Fibonacci backoff"
    );

    Action::requeue(delay)
}

/// How the watch loop should treat a controller stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    /// Credentials rejected; RBAC may have been revoked
    Unauthorized,
    /// Resource version too old; the watcher relists on its own
    Expired,
    /// API server asked us to slow down
    Throttled,
    /// Object or CRD vanished
    NotFound,
    Other,
}

/// Classify a controller stream error from its debug rendering
#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorKind {
    // 404 first: a plain-text 404 body surfaces as a WatchFailed serde error
    if error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found") {
        WatchErrorKind::NotFound
    } else if error.contains("401") || error.contains("Unauthorized") {
        WatchErrorKind::Unauthorized
    } else if error.contains("410") || error.contains("too old resource version") || error.contains("Expired") {
        WatchErrorKind::Expired
    } else if error.contains("429") || error.contains("TooManyRequests") {
        WatchErrorKind::Throttled
    } else {
        WatchErrorKind::Other
    }
}

/// Log a controller stream error at a level matching its kind
pub fn log_watch_error(error: &str) {
    match classify_watch_error(error) {
        WatchErrorKind::Unauthorized => error!(
            error,
            "Watch authentication failed (401), check the controller's ClusterRole and binding"
        ),
        WatchErrorKind::Expired => warn!("Watch resource version expired (410), relisting"),
        WatchErrorKind::Throttled => warn!(error, "API server throttling watch requests (429)"),
        WatchErrorKind::NotFound => warn!(error, "Watched resource not found (404)"),
        WatchErrorKind::Other => error!(error, "Controller stream error"),
    }
}

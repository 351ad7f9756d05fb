//! # Status Reporting
//!
//! Records the rotation lifecycle on the NewCA request. Each write re-reads the
//! request, so a state set by an earlier step is never overwritten with stale
//! metadata.

use tracing::{debug, info};

use crate::constants::STATUS_WRITE_ATTEMPTS;
use crate::controller::error::StoreError;
use crate::controller::retry::retry_on_conflict;
use crate::controller::store::ClusterStore;
use crate::crd::{NewCAStatus, RotationState};

/// Result of a status write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWrite {
    Written,
    /// The request already carried this state
    Unchanged,
    /// The request no longer exists
    Gone,
}

/// Set `status.status` of a NewCA request to `state`
///
/// # Errors
///
/// Any store fault other than the request having been deleted, including
/// `Conflict` once attempts are exhausted.
pub async fn set_rotation_state(
    store: &dyn ClusterStore,
    name: &str,
    namespace: &str,
    state: RotationState,
) -> Result<StatusWrite, StoreError> {
    retry_on_conflict(STATUS_WRITE_ATTEMPTS, "set_rotation_state", || async move {
        let mut request = match store.get_rotation_request(name, namespace).await {
            Ok(request) => request,
            Err(e) if e.is_not_found() => {
                debug!(newca = name, namespace, "NewCA deleted, skipping status write");
                return Ok(StatusWrite::Gone);
            }
            Err(e) => return Err(e),
        };

        if request.rotation_state() == Some(state) {
            return Ok(StatusWrite::Unchanged);
        }

        request.status = Some(NewCAStatus { status: Some(state) });
        store.update_rotation_status(&request).await?;
        info!(newca = name, namespace, status = %state, "Updated NewCA status");
        Ok(StatusWrite::Written)
    })
    .await
}

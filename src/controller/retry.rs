//! # Conflict Retry
//!
//! Bounded read-modify-write loop.
//!
//! The operation passed in must do the whole fetch, mutate and persist cycle so
//! every attempt works on fresh state. Only `StoreError::Conflict` is retried;
//! not-found, rejected and transport faults are returned as-is.

use std::future::Future;

use tracing::{debug, warn};

use crate::controller::error::StoreError;

/// Run `operation` until it succeeds, fails with a non-conflict error, or
/// `attempts` conflicts have been seen
///
/// An `attempts` of 0 is treated as 1.
///
/// # Errors
///
/// Returns the last error produced by `operation`.
pub async fn retry_on_conflict<T, F, Fut>(
    attempts: u32,
    operation_name: &str,
    mut operation: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Err(e) if e.is_conflict() && attempt < attempts => {
                debug!(
                    operation = operation_name,
                    attempt,
                    max_attempts = attempts,
                    error = %e,
                    "Write conflict, retrying on fresh state"
                );
                attempt += 1;
            }
            Err(e) => {
                if e.is_conflict() {
                    warn!(
                        operation = operation_name,
                        attempts,
                        "Write conflict, giving up"
                    );
                }
                return Err(e);
            }
            Ok(value) => return Ok(value),
        }
    }
}

//! # Rotation Policy
//!
//! Decides whether new CA material should replace the trust anchor. Comparison
//! is byte equality only.
//!
//! Only intermediate (leaf CA) rotation under an unchanged root is performed. A
//! changed root is reported as complete without touching anything.

use k8s_openapi::api::core::v1::Secret;

use crate::constants::{CA_CERT, ROOT_CERT};
use crate::controller::error::RotationError;
use crate::controller::validation::secret_bytes;

/// Outcome of comparing new material with the trust anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDecision {
    /// CA certificates are identical, nothing to do
    AlreadyCurrent,
    /// Root certificates differ; root rotation is not supported
    RootChanged,
    /// Install the new material and restart istiod
    Rotate,
}

/// Compare `source` (new material) against `destination` (trust anchor)
///
/// # Errors
///
/// `DestinationMissingKey` if the trust anchor has no CA certificate,
/// `SourceMissingKey` if the new material lacks the CA or root certificate.
pub fn decide_rotation(source: &Secret, destination: &Secret) -> Result<RotationDecision, RotationError> {
    let new_cert = secret_bytes(source, CA_CERT).ok_or(RotationError::SourceMissingKey { key: CA_CERT })?;
    let old_cert =
        secret_bytes(destination, CA_CERT).ok_or(RotationError::DestinationMissingKey { key: CA_CERT })?;
    if new_cert == old_cert {
        return Ok(RotationDecision::AlreadyCurrent);
    }

    let new_root = secret_bytes(source, ROOT_CERT).ok_or(RotationError::SourceMissingKey { key: ROOT_CERT })?;
    match secret_bytes(destination, ROOT_CERT) {
        Some(old_root) if old_root != new_root => Ok(RotationDecision::RootChanged),
        // Equal roots, or the trust anchor has no root yet
        _ => Ok(RotationDecision::Rotate),
    }
}

//! # CA Material Validation
//!
//! Presence checks on CA secrets. Only key presence is checked: certificates are
//! never parsed, so a present but garbage value is still "valid" here.

use k8s_openapi::api::core::v1::Secret;

use crate::constants::{CA_CERT, CA_KEY, ROOT_CERT};

/// Keys istiod needs to run as an intermediate CA
pub const RUNTIME_REQUIRED_KEYS: [&str; 2] = [CA_CERT, CA_KEY];

/// Keys a new CA must carry to be installed
pub const CA_REQUIRED_KEYS: [&str; 3] = [CA_CERT, CA_KEY, ROOT_CERT];

/// Required keys absent from `secret.data`, in `required` order
#[must_use]
pub fn missing_keys(secret: &Secret, required: &[&'static str]) -> Vec<&'static str> {
    let Some(data) = secret.data.as_ref() else {
        return required.to_vec();
    };
    required
        .iter()
        .copied()
        .filter(|key| !data.contains_key(*key))
        .collect()
}

/// Secret holds CA certificate and CA key
#[must_use]
pub fn is_runtime_valid(secret: &Secret) -> bool {
    missing_keys(secret, &RUNTIME_REQUIRED_KEYS).is_empty()
}

/// Secret holds CA certificate, CA key and root certificate
#[must_use]
pub fn is_ca_valid(secret: &Secret) -> bool {
    missing_keys(secret, &CA_REQUIRED_KEYS).is_empty()
}

/// Raw bytes stored under `key`, if present
#[must_use]
pub fn secret_bytes<'a>(secret: &'a Secret, key: &str) -> Option<&'a [u8]> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| value.0.as_slice())
}

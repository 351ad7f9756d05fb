//! # Trust Store Writer
//!
//! Installs new CA material into the `cacerts` secret.
//!
//! The write is conditional on the trust anchor the material was compared
//! against. An existing `cacerts` is replaced at the resourceVersion it was read
//! at; a trust anchor resolved from the legacy secret is created, and fails if
//! `cacerts` appeared in the meantime. Either way a concurrent writer surfaces
//! as `Conflict` and the invocation fails; the controller re-runs the whole
//! rotation on fresh state. Keys outside the CA material are preserved.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use tracing::{debug, info};

use crate::constants::{CACERTS_SECRET_NAME, CA_CERT, CA_KEY, CERT_CHAIN, ISTIO_NAMESPACE, ROOT_CERT};
use crate::controller::error::StoreError;
use crate::controller::resolver::ResolvedDestination;
use crate::controller::store::ClusterStore;

/// Result of a trust anchor write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Copy CA certificate, root certificate, CA key and (if present) chain from
/// `source` into `data`
pub fn install_ca_material(data: &mut BTreeMap<String, ByteString>, source: &Secret) {
    let Some(source_data) = source.data.as_ref() else {
        return;
    };
    for key in [CA_CERT, ROOT_CERT, CA_KEY, CERT_CHAIN] {
        if let Some(value) = source_data.get(key) {
            data.insert(key.to_string(), value.clone());
        }
    }
}

/// Write the new CA material over the resolved trust anchor
///
/// # Errors
///
/// `Conflict` if the trust anchor changed since it was resolved, `Invalid` if
/// an existing trust anchor carries no resourceVersion, any other store fault
/// as-is. Nothing is retried.
pub async fn install_trust_anchor(
    store: &dyn ClusterStore,
    source: &Secret,
    destination: &ResolvedDestination,
) -> Result<UpsertOutcome, StoreError> {
    let mut secret = destination.secret.clone();
    let data = secret.data.get_or_insert_with(BTreeMap::new);
    let before = data.clone();
    install_ca_material(data, source);
    let unchanged = *data == before;

    let outcome = if destination.existed {
        if secret.metadata.resource_version.is_none() {
            return Err(StoreError::Invalid {
                kind: "Secret",
                reason: format!("{ISTIO_NAMESPACE}/{CACERTS_SECRET_NAME} has no resourceVersion"),
            });
        }
        if unchanged {
            debug!(secret = CACERTS_SECRET_NAME, "Trust anchor already up to date");
            UpsertOutcome::Unchanged
        } else {
            store.replace_secret(&secret).await?;
            UpsertOutcome::Updated
        }
    } else {
        secret.metadata.resource_version = None;
        store.create_secret(&secret).await?;
        UpsertOutcome::Created
    };

    info!(
        secret = CACERTS_SECRET_NAME,
        namespace = ISTIO_NAMESPACE,
        outcome = ?outcome,
        "Installed new CA material"
    );
    Ok(outcome)
}

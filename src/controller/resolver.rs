//! # Secret Resolution
//!
//! Finds the active trust anchor. The user-provided `cacerts` secret wins; when
//! it is absent istiod runs on its self-signed `istio-ca-secret`, in which case
//! the trust anchor will be (re)created under `cacerts` and the legacy secret is
//! left alone.

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info};

use crate::constants::{CACERTS_SECRET_NAME, ISTIO_CA_SECRET_NAME, ISTIO_NAMESPACE};
use crate::controller::error::{RotationError, StoreError};
use crate::controller::store::ClusterStore;

/// Where the resolved trust anchor was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationSource {
    /// `cacerts`
    Canonical,
    /// `istio-ca-secret`
    Legacy,
}

/// The trust anchor the new material is compared against and written to
#[derive(Debug, Clone)]
pub struct ResolvedDestination {
    /// Descriptor addressed at `cacerts`. For a legacy hit it carries the legacy
    /// data as comparison baseline and no resourceVersion.
    pub secret: Secret,
    /// Whether `cacerts` already existed
    pub existed: bool,
    pub source: DestinationSource,
}

/// Resolve the new-material secret referenced by a NewCA
///
/// # Errors
///
/// `SourceNotFound` if it does not exist or the reference is empty, `Store` for
/// any other fault.
pub async fn resolve_source(
    store: &dyn ClusterStore,
    name: &str,
    namespace: &str,
) -> Result<Secret, RotationError> {
    if name.is_empty() || namespace.is_empty() {
        return Err(RotationError::SourceNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
    }
    match store.get_secret(name, namespace).await {
        Ok(secret) => Ok(secret),
        Err(StoreError::NotFound { .. }) => Err(RotationError::SourceNotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Resolve the trust anchor: `cacerts`, else `istio-ca-secret`
///
/// # Errors
///
/// `DestinationNotFound` if neither exists, `Store` for any other fault.
pub async fn resolve_destination(store: &dyn ClusterStore) -> Result<ResolvedDestination, RotationError> {
    match store.get_secret(CACERTS_SECRET_NAME, ISTIO_NAMESPACE).await {
        Ok(secret) => {
            debug!(secret = CACERTS_SECRET_NAME, "Using user-provided CA secret");
            return Ok(ResolvedDestination {
                secret,
                existed: true,
                source: DestinationSource::Canonical,
            });
        }
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    match store.get_secret(ISTIO_CA_SECRET_NAME, ISTIO_NAMESPACE).await {
        Ok(legacy) => {
            info!(
                secret = ISTIO_CA_SECRET_NAME,
                target = CACERTS_SECRET_NAME,
                "No user-provided CA secret, falling back to istiod self-signed CA"
            );
            Ok(ResolvedDestination {
                secret: Secret {
                    metadata: ObjectMeta {
                        name: Some(CACERTS_SECRET_NAME.to_string()),
                        namespace: Some(ISTIO_NAMESPACE.to_string()),
                        ..Default::default()
                    },
                    data: Some(legacy.data.unwrap_or_default()),
                    ..Default::default()
                },
                existed: false,
                source: DestinationSource::Legacy,
            })
        }
        Err(e) if e.is_not_found() => Err(RotationError::DestinationNotFound {
            namespace: ISTIO_NAMESPACE.to_string(),
            canonical: CACERTS_SECRET_NAME.to_string(),
            legacy: ISTIO_CA_SECRET_NAME.to_string(),
        }),
        Err(e) => Err(e.into()),
    }
}

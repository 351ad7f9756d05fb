//! # NewCA Spec
//!
//! The rotation request: where the newly issued CA material lives.

use serde::{Deserialize, Serialize};

use crate::constants::{NEW_CA_NAME, NEW_CA_NAMESPACE};
use crate::crd::RotationState;

/// NewCA Custom Resource Definition
///
/// Points the controller at a secret holding newly issued CA material. Only the
/// `new-ca` resource in `istio-system` is acted upon.
///
/// # Example
///
/// ```yaml
/// apiVersion: istiocarotation.intel.com/v1
/// kind: NewCA
/// metadata:
///   name: new-ca
///   namespace: istio-system
/// spec:
///   secret: intermediate-ca-2
///   namespace: ca-issuer
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "NewCA",
    group = "istiocarotation.intel.com",
    version = "v1",
    plural = "newcas",
    namespaced,
    status = "crate::crd::NewCAStatus",
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".spec.secret"}, {"name":"Secret Namespace", "type":"string", "jsonPath":".spec.namespace"}, {"name":"Status", "type":"string", "jsonPath":".status.status"}"#
)]
pub struct NewCASpec {
    /// Name of the secret holding the new CA material
    #[serde(default)]
    pub secret: String,
    /// Namespace of the secret holding the new CA material
    #[serde(default)]
    pub namespace: String,
}

impl NewCA {
    /// Whether a (name, namespace) pair is the singleton rotation request
    #[must_use]
    pub fn is_singleton_identity(name: &str, namespace: &str) -> bool {
        name == NEW_CA_NAME && namespace == NEW_CA_NAMESPACE
    }

    /// (name, namespace) of the source secret
    #[must_use]
    pub fn source_ref(&self) -> (&str, &str) {
        (&self.spec.secret, &self.spec.namespace)
    }

    /// Currently recorded rotation state, if any
    #[must_use]
    pub fn rotation_state(&self) -> Option<RotationState> {
        self.status.as_ref().and_then(|s| s.status)
    }
}

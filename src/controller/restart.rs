//! # Control Plane Restart
//!
//! Forces an istiod rollout by stamping the pod template with the current time,
//! the same mechanism as `kubectl rollout restart`. The rollout itself is not
//! awaited.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use tracing::info;

use crate::constants::{
    ISTIOD_DEPLOYMENT_NAME, ISTIO_NAMESPACE, RESTARTED_AT_ANNOTATION, RESTART_WRITE_ATTEMPTS,
};
use crate::controller::error::StoreError;
use crate::controller::retry::retry_on_conflict;
use crate::controller::store::ClusterStore;

/// Set the restart annotation on a deployment's pod template
pub fn stamp_restart(deployment: &mut Deployment, at: DateTime<Utc>) {
    let template_meta = deployment
        .spec
        .get_or_insert_with(Default::default)
        .template
        .metadata
        .get_or_insert_with(Default::default);
    template_meta
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(
            RESTARTED_AT_ANNOTATION.to_string(),
            at.to_rfc3339_opts(SecondsFormat::Secs, true),
        );
}

/// Restart a deployment by bumping its pod template annotation
///
/// # Errors
///
/// `NotFound` if the deployment does not exist, any other store fault, or
/// `Conflict` once attempts are exhausted.
pub async fn restart_deployment(
    store: &dyn ClusterStore,
    name: &str,
    namespace: &str,
) -> Result<(), StoreError> {
    info!(deployment = name, namespace, "Restarting deployment");
    retry_on_conflict(RESTART_WRITE_ATTEMPTS, "restart_deployment", || async move {
        let mut deployment = store.get_deployment(name, namespace).await?;
        stamp_restart(&mut deployment, Utc::now());
        store.replace_deployment(&deployment).await?;
        Ok(())
    })
    .await
}

/// Restart `istio-system/istiod` so it loads the new CA
///
/// # Errors
///
/// See [`restart_deployment`].
pub async fn restart_istiod(store: &dyn ClusterStore) -> Result<(), StoreError> {
    restart_deployment(store, ISTIOD_DEPLOYMENT_NAME, ISTIO_NAMESPACE).await
}

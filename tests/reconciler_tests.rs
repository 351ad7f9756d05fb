//! # Reconciler Tests
//!
//! Requeue behavior of the controller adapter around the rotation engine.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{engine, FakeStore, Faults};
use kube_runtime::controller::Action;
use newca_controller::constants::{
    CACERTS_SECRET_NAME, CA_CERT, CA_KEY, ISTIO_NAMESPACE, NEW_CA_NAME, NEW_CA_NAMESPACE, ROOT_CERT,
};
use newca_controller::controller::reconciler::{reconcile, Reconciler, ReconcilerError, ReconcilerSettings};
use newca_controller::crd::{NewCA, NewCASpec, RotationState};
use newca_controller::runtime::error_policy::handle_reconciliation_error;

fn request() -> Arc<NewCA> {
    let mut request = NewCA::new(
        NEW_CA_NAME,
        NewCASpec {
            secret: "intermediate-2".to_string(),
            namespace: "ca-issuer".to_string(),
        },
    );
    request.metadata.namespace = Some(NEW_CA_NAMESPACE.to_string());
    Arc::new(request)
}

fn reconciler(store: &Arc<FakeStore>) -> Arc<Reconciler> {
    Arc::new(Reconciler::new(engine(store), ReconcilerSettings::default()))
}

#[tokio::test]
async fn test_successful_reconcile_awaits_change() {
    let store = FakeStore::new();
    store.put_singleton_request("intermediate-2", "ca-issuer");
    store.put_secret("intermediate-2", "ca-issuer", &[(CA_CERT, "B"), (CA_KEY, "k2"), (ROOT_CERT, "X")]);
    store.put_secret(
        CACERTS_SECRET_NAME,
        ISTIO_NAMESPACE,
        &[(CA_CERT, "A"), (CA_KEY, "k1"), (ROOT_CERT, "X")],
    );
    store.put_istiod();

    let action = reconcile(request(), reconciler(&store)).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert_eq!(store.request_state(), Some(RotationState::Complete));
}

#[tokio::test]
async fn test_failed_reconcile_returns_rotation_error() {
    let store = FakeStore::new();
    store.put_singleton_request("intermediate-2", "ca-issuer");

    let err = reconcile(request(), reconciler(&store)).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Rotation(_)));
    assert_eq!(store.request_state(), Some(RotationState::Failure));
}

#[tokio::test]
async fn test_error_policy_requeues_with_fibonacci_backoff() {
    let store = FakeStore::new();
    store.put_singleton_request("intermediate-2", "ca-issuer");
    let ctx = reconciler(&store);
    let obj = request();

    let mut delays = Vec::new();
    for _ in 0..4 {
        let err = reconcile(Arc::clone(&obj), Arc::clone(&ctx)).await.unwrap_err();
        delays.push(handle_reconciliation_error(Arc::clone(&obj), &err, Arc::clone(&ctx)));
    }

    assert_eq!(
        delays,
        vec![
            Action::requeue(Duration::from_secs(5)),
            Action::requeue(Duration::from_secs(5)),
            Action::requeue(Duration::from_secs(10)),
            Action::requeue(Duration::from_secs(15)),
        ]
    );
}

#[tokio::test]
async fn test_success_resets_backoff() {
    let store = FakeStore::new();
    store.put_singleton_request("intermediate-2", "ca-issuer");
    let ctx = reconciler(&store);
    let obj = request();

    for _ in 0..3 {
        let err = reconcile(Arc::clone(&obj), Arc::clone(&ctx)).await.unwrap_err();
        let _requeue = handle_reconciliation_error(Arc::clone(&obj), &err, Arc::clone(&ctx));
    }

    // Fix the cluster so the next invocation succeeds
    store.put_secret("intermediate-2", "ca-issuer", &[(CA_CERT, "A"), (CA_KEY, "k1"), (ROOT_CERT, "X")]);
    store.put_secret(
        CACERTS_SECRET_NAME,
        ISTIO_NAMESPACE,
        &[(CA_CERT, "A"), (CA_KEY, "k1"), (ROOT_CERT, "X")],
    );
    reconcile(Arc::clone(&obj), Arc::clone(&ctx)).await.unwrap();

    // Break it again; the backoff starts over
    store.put_singleton_request("missing-secret", "ca-issuer");
    let err = reconcile(Arc::clone(&obj), Arc::clone(&ctx)).await.unwrap_err();
    let action = handle_reconciliation_error(Arc::clone(&obj), &err, Arc::clone(&ctx));
    assert_eq!(action, Action::requeue(Duration::from_secs(5)));
}

#[tokio::test]
async fn test_request_outside_singleton_identity_is_ignored() {
    let store = FakeStore::new();
    let mut other = NewCA::new(
        "other",
        NewCASpec {
            secret: "intermediate-2".to_string(),
            namespace: "ca-issuer".to_string(),
        },
    );
    other.metadata.namespace = Some("default".to_string());

    let action = reconcile(Arc::new(other), reconciler(&store)).await.unwrap();

    assert_eq!(action, Action::await_change());
    assert!(store.reads().is_empty());
}

#[tokio::test]
async fn test_timeout_records_failure() {
    let store = FakeStore::new();
    store.put_singleton_request("intermediate-2", "ca-issuer");
    store.put_secret("intermediate-2", "ca-issuer", &[(CA_CERT, "B"), (CA_KEY, "k2"), (ROOT_CERT, "X")]);
    store.put_secret(
        CACERTS_SECRET_NAME,
        ISTIO_NAMESPACE,
        &[(CA_CERT, "A"), (CA_KEY, "k1"), (ROOT_CERT, "X")],
    );
    store.put_istiod();
    // istiod lookup stalls after the request was marked in progress
    store.set_faults(Faults {
        deployment_read_delay: Some(Duration::from_secs(5)),
        ..Faults::default()
    });
    let settings = ReconcilerSettings {
        timeout: Duration::from_millis(200),
        ..ReconcilerSettings::default()
    };
    let ctx = Arc::new(Reconciler::new(engine(&store), settings));

    let err = reconcile(request(), ctx).await.unwrap_err();

    assert!(matches!(err, ReconcilerError::Timeout { .. }));
    assert_eq!(store.request_state(), Some(RotationState::Failure));
    assert_eq!(
        store.status_history(),
        vec![RotationState::InProgress, RotationState::Failure]
    );
}

//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, server startup,
//! Kubernetes client setup and the reconciler context.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use tracing::{error, info};

use crate::config::ControllerConfig;
use crate::controller::engine::RotationEngine;
use crate::controller::reconciler::Reconciler;
use crate::controller::server::{start_server, ServerState};
use crate::controller::store::KubeStore;
use crate::crd::NewCA;
use crate::observability;

/// Everything the watch loop needs
pub struct InitializationResult {
    pub client: Client,
    /// NewCA API across all namespaces
    pub newcas: Api<NewCA>,
    pub reconciler: Arc<Reconciler>,
    /// Server state for readiness
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("server_ready", &self.server_state.ready())
            .finish_non_exhaustive()
    }
}

/// Initialize the controller runtime
///
/// # Errors
///
/// Fails if logging or metrics cannot be set up, the metrics address is
/// invalid, the cluster is unreachable, or the NewCA CRD is not installed.
pub async fn initialize(config: &ControllerConfig) -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        bail!("Failed to install rustls crypto provider");
    }

    observability::logging::init_logging(config.log_format)?;

    info!("Starting NewCA controller");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );
    info!(
        namespaces = ?config.namespace_list(),
        leader_election = config.enable_leader_election,
        "Configured"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    match config.metrics_bind_address()? {
        Some(addr) => {
            let state = Arc::clone(&server_state);
            tokio::spawn(async move {
                if let Err(e) = start_server(addr, state).await {
                    error!("HTTP server error: {}", e);
                }
            });
        }
        None => info!("Metrics server disabled"),
    }

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let newcas: Api<NewCA> = Api::all(client.clone());
    // Fail fast when the CRD is missing instead of looping on watch errors
    newcas
        .list(&ListParams::default().limit(1))
        .await
        .context("NewCA CRD is not served by the API server; install it with `crdgen | kubectl apply -f -`")?;

    let store = Arc::new(KubeStore::new(client.clone()));
    let engine = RotationEngine::new(store);
    let reconciler = Arc::new(Reconciler::new(engine, config.reconciler_settings()));

    info!("Controller initialized");

    Ok(InitializationResult {
        client,
        newcas,
        reconciler,
        server_state,
    })
}

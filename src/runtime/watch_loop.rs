//! # Watch Loop
//!
//! Runs the `kube_runtime` controller over NewCA resources until a shutdown
//! signal arrives.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use kube::api::Api;
use kube_runtime::{watcher, Controller};
use tracing::{debug, info, warn};

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::NewCA;
use crate::runtime::error_policy::{handle_reconciliation_error, log_watch_error};

/// Resolves on SIGINT or SIGTERM, the signals `shutdown_on_signal` reacts to
pub async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }
}

/// Report not-ready as soon as `shutdown` resolves
pub async fn withdraw_readiness_on<F>(shutdown: F, server_state: Arc<ServerState>)
where
    F: Future<Output = ()>,
{
    shutdown.await;
    info!("Received shutdown signal, initiating graceful shutdown...");
    server_state.set_ready(false);
}

/// Run the controller watch loop
///
/// Readiness is reported while the loop runs and withdrawn as soon as a
/// shutdown signal is received.
pub async fn run_watch_loop(newcas: Api<NewCA>, reconciler: Arc<Reconciler>, server_state: Arc<ServerState>) {
    tokio::spawn(withdraw_readiness_on(shutdown_signal(), Arc::clone(&server_state)));

    info!("Starting controller watch loop...");
    server_state.set_ready(true);

    Controller::new(newcas, watcher::Config::default().any_semantic())
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, reconciler)
        .for_each(|result| {
            match result {
                Ok((object, action)) => debug!(object = %object, action = ?action, "Reconciled"),
                Err(e) => log_watch_error(&format!("{e:?}")),
            }
            futures::future::ready(())
        })
        .await;

    server_state.set_ready(false);
    info!("Controller stopped gracefully");
}

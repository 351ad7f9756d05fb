//! # Runtime
//!
//! Process bootstrap and the controller loop.
//!
//! - `initialization`: client, logging, metrics and server setup
//! - `leader_election`: Lease-based leader election
//! - `watch_loop`: the `kube_runtime` controller
//! - `error_policy`: requeue backoff and watch error classification

pub mod error_policy;
pub mod initialization;
pub mod leader_election;
pub mod watch_loop;

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{error, info};

use crate::config::ControllerConfig;
use crate::runtime::initialization::initialize;
use crate::runtime::leader_election::LeaderElector;
use crate::runtime::watch_loop::run_watch_loop;

/// Run the controller until shutdown
///
/// # Errors
///
/// Fails if initialization fails or, with leader election enabled, when
/// leadership is lost so the pod restarts and rejoins the election.
pub async fn run(config: ControllerConfig) -> Result<()> {
    let init = initialize(&config).await?;

    if !config.enable_leader_election {
        run_watch_loop(init.newcas, init.reconciler, init.server_state).await;
        return Ok(());
    }

    let identity = std::env::var("HOSTNAME")
        .ok()
        .filter(|hostname| !hostname.is_empty())
        .unwrap_or_else(|| format!("newca-controller-{}", std::process::id()));
    let elector = Arc::new(LeaderElector::new(
        init.client.clone(),
        &config.leader_election_id,
        &config.leader_election_namespace,
        &identity,
    ));
    let mut guard = elector.acquire().await?;

    let server_state = Arc::clone(&init.server_state);
    tokio::select! {
        () = run_watch_loop(init.newcas, init.reconciler, init.server_state) => {
            info!("Stepping down");
            Ok(())
        }
        () = guard.lost() => {
            server_state.set_ready(false);
            error!(identity = %identity, "Leader election lost");
            bail!("leader election lost")
        }
    }
}

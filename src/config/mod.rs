//! # Controller Configuration
//!
//! Command-line flags, each overridable from the environment.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};

use crate::constants::{
    DEFAULT_BACKOFF_MAX_SECS, DEFAULT_BACKOFF_MIN_SECS, DEFAULT_LEADER_ELECTION_ID,
    DEFAULT_METRICS_ADDR, DEFAULT_RECONCILE_TIMEOUT_SECS, ISTIO_NAMESPACE,
};
use crate::controller::reconciler::ReconcilerSettings;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Istio CA rotation controller
#[derive(Debug, Clone, Parser)]
#[command(name = "newca-controller", version, about, long_about = None)]
pub struct ControllerConfig {
    /// The address the metric endpoint binds to (`:port`, `host:port`, or `0` to disable)
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: String,

    /// Enable leader election so only one replica rotates at a time
    #[arg(long, env = "ENABLE_LEADER_ELECTION", default_value_t = false)]
    pub enable_leader_election: bool,

    /// Comma-separated namespaces to watch
    ///
    /// Recorded at startup; rotation always acts on the `new-ca` request in
    /// `istio-system`.
    #[arg(long, env = "NAMESPACES", default_value = "default")]
    pub namespaces: String,

    /// Name of the leader election Lease
    #[arg(long, env = "LEADER_ELECTION_ID", default_value = DEFAULT_LEADER_ELECTION_ID)]
    pub leader_election_id: String,

    /// Namespace of the leader election Lease
    #[arg(long, env = "POD_NAMESPACE", default_value = ISTIO_NAMESPACE)]
    pub leader_election_namespace: String,

    /// Upper bound for one reconciliation, in seconds
    #[arg(long, env = "RECONCILE_TIMEOUT_SECS", default_value_t = DEFAULT_RECONCILE_TIMEOUT_SECS)]
    pub reconcile_timeout_secs: u64,

    /// First requeue delay after a failed reconciliation, in seconds
    #[arg(long, env = "BACKOFF_MIN_SECS", default_value_t = DEFAULT_BACKOFF_MIN_SECS)]
    pub backoff_min_secs: u64,

    /// Largest requeue delay after repeated failures, in seconds
    #[arg(long, env = "BACKOFF_MAX_SECS", default_value_t = DEFAULT_BACKOFF_MAX_SECS)]
    pub backoff_max_secs: u64,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl ControllerConfig {
    /// Metrics bind address, `None` when disabled
    ///
    /// # Errors
    ///
    /// Returns an error if `--metrics-addr` cannot be parsed.
    pub fn metrics_bind_address(&self) -> Result<Option<SocketAddr>> {
        parse_bind_address(&self.metrics_addr)
    }

    /// Namespaces from `--namespaces`
    #[must_use]
    pub fn namespace_list(&self) -> Vec<String> {
        parse_namespaces(&self.namespaces)
    }

    #[must_use]
    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            timeout: Duration::from_secs(self.reconcile_timeout_secs.max(1)),
            backoff_min: Duration::from_secs(self.backoff_min_secs.max(1)),
            backoff_max: Duration::from_secs(self.backoff_max_secs),
        }
    }
}

/// Parse a bind address
///
/// Accepts `:port` (all interfaces), `host:port`, and `0` (disabled).
///
/// # Errors
///
/// Returns an error for anything else.
pub fn parse_bind_address(addr: &str) -> Result<Option<SocketAddr>> {
    let addr = addr.trim();
    if addr == "0" {
        return Ok(None);
    }
    if let Some(port) = addr.strip_prefix(':') {
        let port: u16 = port
            .parse()
            .with_context(|| format!("invalid port in bind address {addr:?}"))?;
        return Ok(Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port)));
    }
    if addr.is_empty() {
        bail!("bind address must not be empty");
    }
    let parsed = addr
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid bind address {addr:?}"))?;
    Ok(Some(parsed))
}

/// Split a comma-separated namespace list, dropping blanks
#[must_use]
pub fn parse_namespaces(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|ns| !ns.is_empty())
        .map(ToString::to_string)
        .collect()
}

//! # NewCA Controller
//!
//! Watches the `NewCA` resource and rotates the Istio intermediate CA.
//!
//! See [`newca_controller::runtime`] for the startup sequence.

use anyhow::Result;
use clap::Parser;
use newca_controller::config::ControllerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ControllerConfig::parse();
    newca_controller::runtime::run(config).await
}

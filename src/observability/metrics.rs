//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `newca_reconciliations_total` - Total number of reconciliations
//! - `newca_reconciliation_errors_total` - Total number of reconciliation errors
//! - `newca_reconciliation_duration_seconds` - Duration of reconciliation operations
//! - `newca_rotation_outcomes_total{outcome}` - Reconciliations by outcome
//! - `newca_control_plane_restarts_total` - istiod restarts triggered
//! - `newca_status_write_failures_total` - Status writes that failed

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::LazyLock;

// Metrics
pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("newca_reconciliations_total", "Total number of reconciliations")
        .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "newca_reconciliation_errors_total",
        "Total number of reconciliation errors",
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "newca_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static ROTATION_OUTCOMES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "newca_rotation_outcomes_total",
            "Total number of reconciliations by rotation outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create ROTATION_OUTCOMES_TOTAL metric - this should never happen")
});

static CONTROL_PLANE_RESTARTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "newca_control_plane_restarts_total",
        "Total number of istiod restarts triggered",
    )
    .expect("Failed to create CONTROL_PLANE_RESTARTS_TOTAL metric - this should never happen")
});

static STATUS_WRITE_FAILURES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "newca_status_write_failures_total",
        "Total number of NewCA status writes that failed",
    )
    .expect("Failed to create STATUS_WRITE_FAILURES_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(ROTATION_OUTCOMES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CONTROL_PLANE_RESTARTS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(STATUS_WRITE_FAILURES_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors() {
    RECONCILIATION_ERRORS_TOTAL.inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_rotation_outcome(outcome: &str) {
    ROTATION_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_control_plane_restarts() {
    CONTROL_PLANE_RESTARTS_TOTAL.inc();
}

pub fn increment_status_write_failures() {
    STATUS_WRITE_FAILURES_TOTAL.inc();
}

//! # Controller
//!
//! The CA rotation workflow and its adapter to `kube_runtime`.
//!
//! - `engine`: rotation state machine
//! - `resolver`: source and trust anchor lookup
//! - `validation`: CA material presence checks
//! - `policy`: leaf/root comparison
//! - `trust_store`: `cacerts` create-or-update
//! - `restart`: istiod rollout trigger
//! - `status`: NewCA status writes
//! - `store`: object store seam and its Kubernetes implementation
//! - `retry`: bounded conflict retry
//! - `reconciler`: `kube_runtime` adapter
//! - `backoff`: Fibonacci requeue backoff
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod engine;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod resolver;
pub mod restart;
pub mod retry;
pub mod server;
pub mod status;
pub mod store;
pub mod trust_store;
pub mod validation;

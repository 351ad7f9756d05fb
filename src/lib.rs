//! NewCA Controller Library
//!
//! Rotates the Istio certificate authority. A `NewCA` resource named `new-ca` in
//! `istio-system` points at a secret holding newly issued CA material; the
//! controller installs it into `istio-system/cacerts` and restarts istiod when
//! only the intermediate changed.
//!
//! ## Quick Start
//!
//! ```rust
//! use newca_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;

//! # Custom Resource Definitions
//!
//! CRD types for the NewCA rotation controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `NewCA` resource and its source secret reference
//! - `status.rs` - Observed rotation state

mod spec;
mod status;

// Re-export all public types
pub use spec::{NewCA, NewCASpec};
pub use status::{NewCAStatus, RotationState};

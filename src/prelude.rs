//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use newca_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Rotation workflow
pub use crate::controller::engine::{RotationEngine, RotationOutcome};
pub use crate::controller::error::{RotationError, StoreError};
pub use crate::controller::store::{ClusterStore, KubeStore};

// Reconciler types
pub use crate::controller::reconciler::{reconcile, Reconciler, ReconcilerError, ReconcilerSettings};

// Config types
pub use crate::config::{ControllerConfig, LogFormat};

//! # NewCA Status
//!
//! Observed rotation state. The wire values are fixed: `Complete`,
//! `In progress` and `Failure`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the NewCA resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub struct NewCAStatus {
    /// Whether the cluster has succeeded in rotating the Istio CA.
    /// Possible values: "Complete", "In progress", "Failure"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RotationState>,
}

/// Rotation state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, schemars::JsonSchema)]
pub enum RotationState {
    /// No rotation is in progress: nothing to do, or the last rotation succeeded
    #[serde(rename = "Complete")]
    Complete,
    /// New material is being installed and istiod restarted
    #[serde(rename = "In progress")]
    InProgress,
    /// The last invocation failed; the next one re-evaluates from scratch
    #[serde(rename = "Failure")]
    Failure,
}

impl RotationState {
    /// Wire representation
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "Complete",
            Self::InProgress => "In progress",
            Self::Failure => "Failure",
        }
    }
}

impl fmt::Display for RotationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

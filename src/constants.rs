//! # Constants
//!
//! Fixed identities and key names the controller acts on, plus process defaults.
//!
//! The controller recognizes exactly one `NewCA` request and writes to exactly one
//! trust-anchor secret, so these names are not configurable.

/// Name of the only `NewCA` request the controller acts upon
pub const NEW_CA_NAME: &str = "new-ca";

/// Namespace of the only `NewCA` request the controller acts upon
pub const NEW_CA_NAMESPACE: &str = "istio-system";

/// Namespace holding the Istio trust anchor and control plane
pub const ISTIO_NAMESPACE: &str = "istio-system";

/// User-provided CA secret consumed by istiod (canonical trust anchor)
pub const CACERTS_SECRET_NAME: &str = "cacerts";

/// Self-signed CA secret generated by istiod when no `cacerts` exists
pub const ISTIO_CA_SECRET_NAME: &str = "istio-ca-secret";

/// CA certificate key
pub const CA_CERT: &str = "ca-cert.pem";

/// CA private key key
pub const CA_KEY: &str = "ca-key.pem";

/// Root certificate key
pub const ROOT_CERT: &str = "root-cert.pem";

/// Optional certificate chain key
pub const CERT_CHAIN: &str = "cert-chain.pem";

/// Control plane deployment restarted after a rotation
pub const ISTIOD_DEPLOYMENT_NAME: &str = "istiod";

/// Pod template annotation bumped to force an istiod rollout
pub const RESTARTED_AT_ANNOTATION: &str = "newca-controller/restartedAt";

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "newca-controller";

/// Default metrics bind address (Go-style `:port` accepted)
pub const DEFAULT_METRICS_ADDR: &str = ":8080";

/// Default leader election lease name
pub const DEFAULT_LEADER_ELECTION_ID: &str = "3ed0e5db.intel.com";

/// Default upper bound for one reconciliation (seconds)
pub const DEFAULT_RECONCILE_TIMEOUT_SECS: u64 = 60;

/// Default minimum error backoff (seconds)
pub const DEFAULT_BACKOFF_MIN_SECS: u64 = 5;

/// Default maximum error backoff (seconds)
pub const DEFAULT_BACKOFF_MAX_SECS: u64 = 300;

/// Write attempts for the istiod restart annotation
pub const RESTART_WRITE_ATTEMPTS: u32 = 3;

/// Write attempts for the `NewCA` status
pub const STATUS_WRITE_ATTEMPTS: u32 = 3;

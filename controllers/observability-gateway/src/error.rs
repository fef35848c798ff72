//! Controller-specific error types.
//!
//! Store failures keep their classification (`StoreError`) so the error
//! policy can tell a conflict from an outage.

use thiserror::Error;
use kube::Error as KubeError;
use state_store::StoreError;

/// Errors that can occur in the Observability Gateway Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// State store error
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// Kubernetes API error outside the state store (client setup, watches)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Malformed desired spec
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Existing child differs in a field the API server will not change
    #[error("{kind} {name}: field {field} is immutable and differs from the desired value")]
    ImmutableField {
        kind: &'static str,
        name: String,
        field: &'static str,
    },

    /// Existing child is controlled by another object
    #[error("{kind} {name} is already controlled by {owner}")]
    AlreadyOwned {
        kind: &'static str,
        name: String,
        owner: String,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),

    /// Metrics registration failed
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Health/metrics server failed
    #[error("Metrics server error: {0}")]
    MetricsServer(#[from] std::io::Error),
}

impl ControllerError {
    /// True if the pass lost an optimistic concurrency race and should be
    /// retried promptly against fresh state.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }

    /// Short label for the `reason` of metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Store(StoreError::Conflict(_)) | Self::Store(StoreError::AlreadyExists(_)) => "conflict",
            Self::Store(StoreError::Unavailable(_)) => "unavailable",
            Self::Store(_) => "store",
            Self::Kube(_) => "kube",
            Self::Validation(_) => "validation",
            Self::ImmutableField { .. } => "immutable_field",
            Self::AlreadyOwned { .. } => "already_owned",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Watch(_) => "watch",
            Self::Metrics(_) | Self::MetricsServer(_) => "metrics",
        }
    }
}

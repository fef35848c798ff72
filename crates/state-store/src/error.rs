//! State store errors

use thiserror::Error;

/// Errors that can occur when reading or writing the declarative state store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error that does not map to a more specific variant
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// Object does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic concurrency failure: the write targeted a stale resourceVersion
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Create targeted a name that is already taken
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The store rejected the object (schema or immutable field violation)
    #[error("Invalid object: {0}")]
    Invalid(String),

    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Classifies a kube client error by its HTTP status.
    pub fn from_kube(err: kube::Error) -> Self {
        if let kube::Error::Api(response) = &err {
            let message = response.message.clone();
            match response.code {
                404 => return Self::NotFound(message),
                409 if response.reason == "AlreadyExists" => return Self::AlreadyExists(message),
                409 => return Self::Conflict(message),
                422 => return Self::Invalid(message),
                500..=599 => return Self::Unavailable(message),
                _ => {}
            }
        }
        Self::Kube(err)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// True for failures the caller should retry after re-fetching.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::AlreadyExists(_))
    }
}

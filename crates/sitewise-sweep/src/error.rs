//! Error types shared across the cleanup pipeline

use crate::schedule::CyclicDependencyError;
use thiserror::Error;

/// Errors returned by a [`ResourceApi`](crate::api::ResourceApi) call.
///
/// `NotFound` is an expected signal: delete, describe and disassociate treat
/// it as success. `Transport` is fatal for a run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Resource does not exist (already deleted or never existed)
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Rate limit exceeded (retryable)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Another operation is in flight on the resource (retryable)
    #[error("Conflicting operation: {message}")]
    Conflict { message: String },

    /// Network, credential or permission failure
    #[error("Transport failure: {message}")]
    Transport { message: String },

    /// Any other service error
    #[error("SiteWise error {code}: {message}")]
    Service { code: String, message: String },
}

impl ApiError {
    /// Shorthand for a not-found error naming a resource
    pub fn not_found(resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource: resource.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound { .. })
    }

    /// Check if the call may succeed when repeated later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Throttled | ApiError::Conflict { .. })
    }

    /// Check if this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(self, ApiError::Transport { .. })
    }
}

/// Errors that abort a cleanup run
#[derive(Debug, Error)]
pub enum CleanupError {
    /// Listing or describing the resource graph failed
    #[error("Failed to enumerate resources")]
    Enumeration(#[source] ApiError),

    /// A transport failure interrupted deletion
    #[error("Deletion aborted")]
    Transport(#[source] ApiError),

    /// The dependency graph is not a DAG
    #[error(transparent)]
    CyclicDependency(#[from] CyclicDependencyError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_helpers() {
        assert!(ApiError::not_found("Asset a-1").is_not_found());
        assert!(ApiError::Throttled.is_retryable());
        assert!(
            ApiError::Conflict {
                message: "busy".into()
            }
            .is_retryable()
        );
        assert!(
            ApiError::Transport {
                message: "dns".into()
            }
            .is_fatal()
        );
        assert!(
            !ApiError::Service {
                code: "ValidationException".into(),
                message: "bad".into()
            }
            .is_fatal()
        );
    }

    #[test]
    fn cleanup_error_keeps_source() {
        let err = CleanupError::Enumeration(ApiError::Transport {
            message: "connection reset".into(),
        });
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("connection reset"));
    }
}

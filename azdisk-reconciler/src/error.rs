//! Error types for provider calls and reconciliation.

use thiserror::Error;

/// Errors reported by a [`ComputeProvider`](crate::traits::ComputeProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The requested resource does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The provider rejected a request.
    #[error("Request failed ({status}): {message}")]
    Request {
        /// HTTP-style status code, 0 when the request never reached the provider
        status: u16,
        message: String,
    },

    /// A long-running operation reached a terminal failure state.
    #[error("Operation failed: {0}")]
    OperationFailed(String),

    /// The provider returned a document that could not be understood.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    /// Whether this error means "the resource is absent".
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

/// Errors that abort a reconciliation.
///
/// Every variant names the resource group and resource it concerns so the
/// message can be surfaced to the operator as-is.
#[derive(Error, Debug)]
pub enum ReconcileError {
    /// The desired state is self-inconsistent. Raised before any provider call.
    #[error("Invalid disk request for {resource_group}/{name}: {message}")]
    Validation {
        resource_group: String,
        name: String,
        message: String,
    },

    /// A provider read failed for a reason other than absence.
    #[error("Error {action} {resource_group}/{name}: {source}")]
    Provider {
        action: String,
        resource_group: String,
        name: String,
        #[source]
        source: ProviderError,
    },

    /// A mutating provider call (disk create/update/delete, vm write) failed.
    #[error("Error {action} {resource_group}/{name} - {message}")]
    Apply {
        action: String,
        resource_group: String,
        name: String,
        message: String,
    },

    /// The disk claims an attachment that the vm does not record.
    #[error("Attachment error for {resource_group}/{name}: {message}")]
    Attachment {
        resource_group: String,
        name: String,
        message: String,
    },
}

impl ReconcileError {
    pub(crate) fn validation(
        resource_group: &str,
        name: &str,
        message: impl Into<String>,
    ) -> Self {
        ReconcileError::Validation {
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn provider(
        action: impl Into<String>,
        resource_group: &str,
        name: &str,
        source: ProviderError,
    ) -> Self {
        ReconcileError::Provider {
            action: action.into(),
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            source,
        }
    }

    pub(crate) fn apply(
        action: impl Into<String>,
        resource_group: &str,
        name: &str,
        source: &ProviderError,
    ) -> Self {
        ReconcileError::Apply {
            action: action.into(),
            resource_group: resource_group.to_string(),
            name: name.to_string(),
            message: source.to_string(),
        }
    }
}

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Result type alias for provider calls.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

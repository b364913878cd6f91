//! Error types for the model layer.

use std::fmt;

/// Result type alias for model operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;

/// Errors reported by a collaborator fetch.
///
/// The backing store distinguishes exactly two failure kinds. Neither is
/// retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The query was malformed or its parameters were out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backing store could not execute the query.
    #[error("execution failure: {0}")]
    ExecutionFailure(String),
}

impl FetchError {
    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an execution-failure error.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::ExecutionFailure(message.into())
    }
}

/// Errors returned by model engines.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The caller supplied an out-of-range page index or size, or a
    /// malformed query.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A collaborator fetch failed; the previously displayed state was kept.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// An in-place update carried an item whose identity differs from the
    /// retained node's identity.
    #[error("identity mismatch: node {expected} cannot be updated with item {actual}")]
    IdentityMismatch { expected: String, actual: String },
}

impl ModelError {
    /// Create an invalid-argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an identity-mismatch error from the two offending identities.
    pub fn identity_mismatch(expected: &impl fmt::Debug, actual: &impl fmt::Debug) -> Self {
        Self::IdentityMismatch {
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }

    /// Returns `true` for errors caused by the caller's arguments.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Fetch(FetchError::InvalidArgument(_))
        )
    }
}

//! Crate-wide error taxonomy.
//!
//! Every service operation fails with one of these kinds so callers can
//! render a specific message and decide whether re-fetching state, fixing
//! input, or requesting elevated permission is the right recovery. Nothing
//! is swallowed internally; the only log-and-continue site is the composite
//! overview read in `family_service`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input; recoverable by correcting the request.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The caller lacks the role or permission flag for this operation.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// The requested transition would violate current state (duplicate
    /// pending invitation, double accept, lost conditional-write race).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A time-boxed resource is past its validity window.
    #[error("expired: {0}")]
    Expired(String),

    /// The referenced entity does not exist or is not visible to the caller.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation would break a structural invariant, such as leaving a
    /// family without any admin.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// Storage layer failure.
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        DomainError::Authorization(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        DomainError::Conflict(msg.into())
    }

    pub fn expired(msg: impl Into<String>) -> Self {
        DomainError::Expired(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        DomainError::NotFound(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        DomainError::InvariantViolation(msg.into())
    }
}

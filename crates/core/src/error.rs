//! Error model shared by the domain and storage layers.

use thiserror::Error;

/// Domain-level error raised while building values (identifiers, inputs).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. parse failure, zero key).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

/// Failure reported by a storage collaborator.
///
/// These are infrastructure errors (connectivity, constraints, locking) as opposed to
/// validation failures, which are detected before any storage write happens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend could not be reached or the pool was closed.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A storage-level constraint rejected a write (unique key, foreign key, check).
    #[error("constraint violated: {0}")]
    Constraint(String),

    /// An in-process lock was poisoned by a panicking writer.
    #[error("lock poisoned")]
    LockPoisoned,

    /// Waiting for a per-carrier lock exceeded the configured timeout.
    #[error("lock timeout: {0}")]
    LockTimeout(String),

    /// Any other backend failure (query, decoding, commit).
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

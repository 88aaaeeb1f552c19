//! Infrastructure and service-level error types.

use thiserror::Error;

use agrisk_core::DomainError;
use agrisk_inventory::ProjectionError;

/// Alert/notification persistence error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A concurrent writer changed the row first (status moved, unique key taken).
    #[error("store conflict: {0}")]
    Conflict(String),

    /// Backend unreachable or failed mid-operation. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A persisted row could not be decoded into a valid domain value.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        StoreError::Corrupt(value.to_string())
    }
}

/// Failure reading the movement ledger or reference data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("invalid reference data: {0}")]
    Invalid(String),
}

/// Error surfaced by engine operations to their callers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// Transient persistence failure, propagated rather than swallowed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
            DomainError::InvariantViolation(msg) => EngineError::Store(StoreError::Corrupt(msg)),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(msg) => EngineError::NotFound(msg),
            StoreError::Conflict(msg) => EngineError::Conflict(msg),
            other => EngineError::Store(other),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

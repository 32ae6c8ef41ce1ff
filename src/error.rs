//! Crate-wide error type.
//!
//! Every fallible public operation returns [`MonitorResult<T>`]. Worker
//! loops never propagate panics or exceptions across a thread boundary —
//! they match on the result, log, and increment a stats counter instead.

use thiserror::Error;

/// Structured error kinds for the monitoring core.
///
/// Mirrors the language-neutral kinds in the specification's error design
/// section: each is a distinct failure mode a caller can branch on rather
/// than parsing a message string.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("already started")]
    AlreadyStarted,

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("operation failed: {0}")]
    OperationFailed(String),

    #[error("retry attempts exhausted after {attempts} tries: {message}")]
    RetryAttemptsExhausted { attempts: u32, message: String },

    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),

    #[error("storage read failed: {0}")]
    StorageReadFailed(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("operation cancelled: {0}")]
    OperationCancelled(String),
}

/// Result alias used throughout the public API.
pub type MonitorResult<T> = Result<T, MonitorError>;

impl MonitorError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

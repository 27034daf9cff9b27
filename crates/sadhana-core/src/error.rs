//! Core error types for sadhana-core.
//!
//! The orchestrator's public surface swallows recoverable failures
//! (persistence, dispatcher, stale ids) and logs them; only
//! `InvariantViolation` is allowed to escape to callers, since it
//! indicates a programming error rather than an environmental one.

use thiserror::Error;

/// Core error type for sadhana-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Read or write against the persistent key-value store failed.
    #[error("Persistence error for key '{key}': {message}")]
    Persistence { key: String, message: String },

    /// Notification scheduling or cancellation failed.
    #[error("Dispatcher error: {0}")]
    Dispatcher(String),

    /// A precondition that callers are required to uphold was broken.
    /// The canonical case: single-instance upsert against a date whose
    /// day was never generated.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Build a persistence error for the given storage key.
    pub fn persistence(key: impl Into<String>, message: impl ToString) -> Self {
        CoreError::Persistence {
            key: key.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

//! Event error types.

use thiserror::Error;

/// Event error type.
#[derive(Error, Debug)]
pub enum EventError {
    /// Event key is empty or whitespace
    #[error("Event key must not be empty")]
    EmptyKey,

    /// A number JSON cannot represent (NaN or infinity)
    #[error("Event field `{0}` must be a finite number")]
    NonFinite(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using EventError.
pub type EventResult<T> = Result<T, EventError>;

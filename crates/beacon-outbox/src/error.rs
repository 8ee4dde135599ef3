//! Outbox error types.

use thiserror::Error;

/// Outbox error type.
#[derive(Error, Debug)]
pub enum OutboxError {
    /// Dequeue called on an empty queue
    #[error("Request queue is empty")]
    EmptyQueue,

    /// Persisted record that cannot be turned back into a request
    #[error("Invalid request record {0}")]
    InvalidRecord(i64),

    /// HTTP client setup error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using OutboxError.
pub type OutboxResult<T> = Result<T, OutboxError>;

/// Outcome of a single failed delivery attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Connection, timeout, or other transport-level failure
    #[error("Transport failed: {0}")]
    Transport(String),

    /// Collector answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Collector answered 2xx but did not accept the request
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

//! Session error types.

use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// begin called while a session is running
    #[error("Session already started")]
    AlreadyStarted,

    /// extend/end called without a running session
    #[error("No session in progress")]
    NotStarted,

    /// Event flush error
    #[error("Event error: {0}")]
    Events(#[from] beacon_events::EventError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;

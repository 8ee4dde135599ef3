//! SDK error types.

use thiserror::Error;

/// SDK error type.
#[derive(Error, Debug)]
pub enum SdkError {
    /// Input rejected before any state changed
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Configuration or path error
    #[error("Core error: {0}")]
    Core(#[from] beacon_config_and_utils::CoreError),

    /// Database could not be opened
    #[error("Database error: {0}")]
    Database(#[from] beacon_database::DatabaseError),

    /// Outbox setup error
    #[error("Outbox error: {0}")]
    Outbox(#[from] beacon_outbox::OutboxError),

    /// Event error
    #[error("Event error: {0}")]
    Events(#[from] beacon_events::EventError),

    /// A direct fetch was not answered
    #[error("Delivery error: {0}")]
    Delivery(#[from] beacon_outbox::DeliveryError),

    /// Session error
    #[error("Session error: {0}")]
    Session(#[from] beacon_session::SessionError),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using SdkError.
pub type SdkResult<T> = Result<T, SdkError>;

pub(crate) fn validation(message: impl Into<String>) -> SdkError {
    SdkError::Validation(message.into())
}

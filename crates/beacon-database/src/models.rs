//! Database model types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted outbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: i64,
    pub is_get: bool,
    /// Full URL for GET requests.
    pub url: Option<String>,
    /// JSON body for POST requests.
    pub body: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Which aggregator buffer an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventClass {
    View,
    NonView,
}

impl EventClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "view",
            Self::NonView => "non_view",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "view" => Some(Self::View),
            "non_view" => Some(Self::NonView),
            _ => None,
        }
    }
}

/// Persisted buffered event.
///
/// The event body and its segmentation are stored in separate tables and
/// rejoined on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub class: EventClass,
    /// Event JSON without segmentation.
    pub payload: String,
    /// Segmentation JSON, if the event had any.
    pub segmentation: Option<String>,
    pub created_at: DateTime<Utc>,
}

//! Core types, configuration, and utilities shared by the beacon crates.

mod clock;
mod config;
mod error;
mod logging;
mod metrics;
mod paths;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock, TimeMetrics, Timestamper};
pub use config::{
    Config, DEFAULT_DELIVERY_MAX_ATTEMPTS, DEFAULT_EVENT_SEND_THRESHOLD, DEFAULT_LOG_LEVEL,
    DEFAULT_POST_THRESHOLD_BYTES, DEFAULT_SERVER_URL, DEFAULT_SESSION_DURATION_SECS,
    DEFAULT_STORED_REQUEST_LIMIT, MAX_SESSION_DURATION_SECS, SDK_NAME, SDK_VERSION,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service, init_logging_in, parse_level};
pub use metrics::{MetricsProvider, SharedMetrics, StaticMetrics};
pub use paths::Paths;

//! SDK configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// SDK name sent with every request.
pub const SDK_NAME: &str = "beacon-rust";

/// SDK version sent with every request.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default collector URL (can be overridden at compile time via BEACON_SERVER_URL env var).
pub const DEFAULT_SERVER_URL: &str = match option_env!("BEACON_SERVER_URL") {
    Some(url) => url,
    None => "https://analytics.example.com",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default flush threshold for both event buffers.
pub const DEFAULT_EVENT_SEND_THRESHOLD: usize = 100;

/// Default request queue capacity.
pub const DEFAULT_STORED_REQUEST_LIMIT: usize = 1000;

/// Default session timer interval in seconds.
pub const DEFAULT_SESSION_DURATION_SECS: u64 = 60;

/// Upper bound for the session timer interval in seconds.
pub const MAX_SESSION_DURATION_SECS: u64 = 600;

/// Payload size above which requests switch from GET to POST.
pub const DEFAULT_POST_THRESHOLD_BYTES: usize = 1800;

/// Delivery attempts per request per drain pass.
pub const DEFAULT_DELIVERY_MAX_ATTEMPTS: u32 = 3;

/// SDK configuration.
///
/// Read-only once handed to the SDK context; every component receives a
/// shared reference instead of consulting process-wide state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Collector base URL. Requests are sent to `{server_url}/i`.
    pub server_url: String,
    /// App key for the application being tracked.
    pub app_key: String,
    /// Device id. Generated and persisted on first start when absent.
    pub device_id: Option<String>,
    /// Salt for the `checksum256` tamper-protection parameter.
    pub salt: Option<String>,
    /// Send every request with POST.
    pub enable_post: bool,
    /// Payload size that forces POST even when `enable_post` is off.
    pub post_threshold_bytes: usize,
    /// Number of buffered view events that triggers a flush.
    pub event_view_send_threshold: usize,
    /// Number of buffered non-view events that triggers a flush.
    pub event_non_view_send_threshold: usize,
    /// Maximum number of requests kept in the queue.
    pub stored_request_limit: usize,
    /// Session timer interval in seconds.
    pub session_duration_secs: u64,
    /// Disable automatic begin/extend/end; the host drives sessions.
    pub manual_session_handling: bool,
    /// Maximum number of crash breadcrumbs kept.
    pub total_breadcrumbs_allowed: usize,
    /// Report errors passed to the log callback as crashes.
    pub enable_automatic_crash_reporting: bool,
    /// Pretend to work without enqueueing anything.
    pub enable_test_mode: bool,
    /// Delivery attempts per request per drain pass.
    pub delivery_max_attempts: u32,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            app_key: String::new(),
            device_id: None,
            salt: None,
            enable_post: false,
            post_threshold_bytes: DEFAULT_POST_THRESHOLD_BYTES,
            event_view_send_threshold: DEFAULT_EVENT_SEND_THRESHOLD,
            event_non_view_send_threshold: DEFAULT_EVENT_SEND_THRESHOLD,
            stored_request_limit: DEFAULT_STORED_REQUEST_LIMIT,
            session_duration_secs: DEFAULT_SESSION_DURATION_SECS,
            manual_session_handling: false,
            total_breadcrumbs_allowed: 100,
            enable_automatic_crash_reporting: true,
            enable_test_mode: false,
            delivery_max_attempts: DEFAULT_DELIVERY_MAX_ATTEMPTS,
            request_timeout_secs: 30,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Create a config for the given collector and app key.
    pub fn new(server_url: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            app_key: app_key.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("BEACON_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Some(url) = non_empty_env("BEACON_SERVER_URL") {
            self.server_url = url;
        }
        if let Some(app_key) = non_empty_env("BEACON_APP_KEY") {
            self.app_key = app_key;
        }
        if let Some(device_id) = non_empty_env("BEACON_DEVICE_ID") {
            self.device_id = Some(device_id);
        }
    }

    /// Check the configuration before the SDK starts using it.
    pub fn validate(&self) -> CoreResult<()> {
        self.server_url()?;

        if self.app_key.trim().is_empty() {
            return Err(CoreError::Config("app_key is required".to_string()));
        }
        if self.event_view_send_threshold == 0 || self.event_non_view_send_threshold == 0 {
            return Err(CoreError::Config(
                "event send thresholds must be at least 1".to_string(),
            ));
        }
        if self.stored_request_limit == 0 {
            return Err(CoreError::Config(
                "stored_request_limit must be at least 1".to_string(),
            ));
        }
        if !(1..=MAX_SESSION_DURATION_SECS).contains(&self.session_duration_secs) {
            return Err(CoreError::Config(format!(
                "session_duration_secs must be between 1 and {}",
                MAX_SESSION_DURATION_SECS
            )));
        }
        if self.delivery_max_attempts == 0 {
            return Err(CoreError::Config(
                "delivery_max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the collector URL as a parsed URL.
    pub fn server_url(&self) -> CoreResult<Url> {
        Url::parse(&self.server_url).map_err(CoreError::from)
    }

    /// Endpoint that receives all outbound requests.
    pub fn input_url(&self) -> String {
        format!("{}/i", self.server_url.trim_end_matches('/'))
    }

    /// Endpoint for direct reads such as remote config.
    pub fn output_url(&self) -> String {
        format!("{}/o/sdk", self.server_url.trim_end_matches('/'))
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|value| !value.is_empty())
}

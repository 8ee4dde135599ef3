//! Device and platform metrics embedded in session and crash requests.

use std::collections::BTreeMap;
use std::sync::Arc;

/// Supplies a flat map of device/platform metrics.
///
/// Queried at request-build time; implementations must be cheap to call.
pub trait MetricsProvider: Send + Sync {
    fn metrics(&self) -> BTreeMap<String, String>;
}

/// Shared handle to a metrics provider.
pub type SharedMetrics = Arc<dyn MetricsProvider>;

/// Fixed set of metrics captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticMetrics {
    values: BTreeMap<String, String>,
}

impl StaticMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics derivable from the running process.
    pub fn from_env(app_version: &str) -> Self {
        let locale = std::env::var("LC_ALL")
            .or_else(|_| std::env::var("LANG"))
            .ok()
            .map(|raw| raw.split('.').next().unwrap_or_default().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "en_US".to_string());

        Self::new()
            .with("_os", std::env::consts::OS)
            .with("_device", std::env::consts::ARCH)
            .with("_app_version", app_version)
            .with("_locale", &locale)
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.values.insert(key.to_string(), value.to_string());
        self
    }
}

impl MetricsProvider for StaticMetrics {
    fn metrics(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }
}

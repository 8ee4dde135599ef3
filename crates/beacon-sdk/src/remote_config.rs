//! Remote config.
//!
//! Values are fetched from the output endpoint on demand, outside the request
//! queue, and cached in the settings store so they survive restarts.

use crate::{Beacon, SdkResult};
use serde_json::{Map, Value};
use tracing::{info, warn};

const REMOTE_CONFIG_KEY: &str = "remote_config";

/// Remote config values by key.
pub type RemoteConfig = Map<String, Value>;

impl Beacon {
    /// The last fetched remote config, if any.
    pub fn remote_config(&self) -> Option<RemoteConfig> {
        let raw = self.settings.get(REMOTE_CONFIG_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(config) => Some(config),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable remote config");
                self.settings.remove(REMOTE_CONFIG_KEY);
                None
            }
        }
    }

    /// Fetch remote config now. The cache is replaced only when the collector
    /// answers with a JSON object; on any error the previous values stay.
    pub async fn update_remote_config(&self) -> SdkResult<RemoteConfig> {
        if self.test_mode() {
            return Ok(self.remote_config().unwrap_or_default());
        }

        let url = self.builder.fetch_url(&[("method", "fetch_remote_config")]);
        let response = self.transport.send_get(&url).await?;
        let config: RemoteConfig = serde_json::from_str(&response.body)?;

        self.settings
            .set(REMOTE_CONFIG_KEY, &Value::Object(config.clone()).to_string());
        info!(keys = config.len(), "Remote config updated");
        Ok(config)
    }
}

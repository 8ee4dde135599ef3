//! Request construction.
//!
//! Every request carries the base parameters (app key, device id, SDK
//! identity, time metrics). Small payloads go out as GET query strings,
//! large ones (or all of them, with `enable_post`) as a JSON POST body.

use crate::RequestPayload;
use beacon_config_and_utils::{Config, Timestamper, SDK_NAME, SDK_VERSION};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Request parameters, in insertion order.
pub type Params = Vec<(String, String)>;

/// Hex-encoded SHA-256 of `payload` followed by `salt`.
pub fn checksum256(payload: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Builds request payloads from parameter lists.
pub struct RequestBuilder {
    config: Arc<Config>,
    timestamper: Arc<Timestamper>,
    device_id: RwLock<String>,
}

impl RequestBuilder {
    pub fn new(config: Arc<Config>, timestamper: Arc<Timestamper>, device_id: String) -> Self {
        Self {
            config,
            timestamper,
            device_id: RwLock::new(device_id),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn timestamper(&self) -> &Arc<Timestamper> {
        &self.timestamper
    }

    pub fn device_id(&self) -> String {
        self.device_id
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Requests built after this call carry the new id.
    pub fn set_device_id(&self, device_id: &str) {
        *self.device_id.write().unwrap_or_else(|e| e.into_inner()) = device_id.to_string();
    }

    fn base_params(&self) -> Params {
        let time = self.timestamper.next();
        vec![
            ("app_key".to_string(), self.config.app_key.clone()),
            ("device_id".to_string(), self.device_id()),
            ("sdk_name".to_string(), SDK_NAME.to_string()),
            ("sdk_version".to_string(), SDK_VERSION.to_string()),
            ("timestamp".to_string(), time.timestamp.to_string()),
            ("hour".to_string(), time.hour.to_string()),
            ("dow".to_string(), time.dow.to_string()),
            ("tz".to_string(), time.tz.to_string()),
        ]
    }

    fn salt(&self) -> Option<&str> {
        self.config.salt.as_deref().filter(|salt| !salt.is_empty())
    }

    /// Build a payload from request-specific parameters.
    pub fn build(&self, params: Params) -> RequestPayload {
        let mut all = self.base_params();
        all.extend(params);

        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(all.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .finish();

        if self.config.enable_post || query.len() > self.config.post_threshold_bytes {
            let mut body: Map<String, Value> = all
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect();
            if let Some(salt) = self.salt() {
                let digest = checksum256(&Value::Object(body.clone()).to_string(), salt);
                body.insert("checksum256".to_string(), Value::String(digest));
            }
            let body = Value::Object(body).to_string();
            debug!(bytes = body.len(), "Built POST request");
            RequestPayload::Post { body }
        } else {
            let query = match self.salt() {
                Some(salt) => {
                    let digest = checksum256(&query, salt);
                    format!("{query}&checksum256={digest}")
                }
                None => query,
            };
            RequestPayload::Get {
                url: format!("{}?{}", self.config.input_url(), query),
            }
        }
    }

    /// URL for a direct read against the output endpoint. Carries only the
    /// app key and device id; these requests never go through the queue.
    pub fn fetch_url(&self, params: &[(&str, &str)]) -> String {
        let device_id = self.device_id();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("app_key", &self.config.app_key)
            .append_pair("device_id", &device_id)
            .extend_pairs(params.iter().copied())
            .finish();
        format!("{}?{}", self.config.output_url(), query)
    }

    /// Shorthand for building from string slices.
    pub fn build_from<'a, I>(&self, params: I) -> RequestPayload
    where
        I: IntoIterator<Item = (&'a str, String)>,
    {
        self.build(params.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}

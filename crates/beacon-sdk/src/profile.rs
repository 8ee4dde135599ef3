//! User profile details and custom property mutations.

use crate::{validation, Beacon, SdkResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::debug;

const PICTURE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".gif"];

/// Standard user profile fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "picture", skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "byear", skip_serializing_if = "Option::is_none")]
    pub birth_year: Option<i32>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub custom: BTreeMap<String, String>,
}

/// Empty, or a URL whose path ends in a known image extension.
pub fn is_picture_valid(url: &str) -> bool {
    if url.is_empty() {
        return true;
    }
    let path = url.split(['?', '#']).next().unwrap_or_default().to_lowercase();
    PICTURE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Pending custom-property mutations, keyed by property.
#[derive(Debug, Default)]
pub(crate) struct CustomProperties {
    pending: Mutex<Map<String, Value>>,
}

impl CustomProperties {
    fn put(&self, key: &str, value: Value) -> SdkResult<()> {
        if key.trim().is_empty() {
            return Err(validation("property key must not be empty"));
        }
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value);
        Ok(())
    }

    fn take(&self) -> Map<String, Value> {
        std::mem::take(&mut *self.pending.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn len(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Beacon {
    /// Send standard profile fields.
    pub async fn set_user_details(&self, details: &UserDetails) -> SdkResult<()> {
        if let Some(picture) = &details.picture_url {
            if !is_picture_valid(picture) {
                return Err(validation(format!("invalid picture url: {picture}")));
            }
        }
        if self.test_mode() {
            return Ok(());
        }

        let json = serde_json::to_string(details)?;
        self.enqueue(vec![("user_details".to_string(), json)]).await;
        debug!("User details queued");
        Ok(())
    }

    /// Send custom profile fields right away.
    pub async fn set_custom_user_details(&self, custom: &BTreeMap<String, String>) -> SdkResult<()> {
        if custom.is_empty() {
            return Err(validation("custom details must not be empty"));
        }
        if self.test_mode() {
            return Ok(());
        }

        let json = json!({ "custom": custom }).to_string();
        self.enqueue(vec![("user_details".to_string(), json)]).await;
        Ok(())
    }

    pub fn set_property(&self, key: &str, value: &str) -> SdkResult<()> {
        self.custom_properties.put(key, Value::String(value.to_string()))
    }

    pub fn set_property_once(&self, key: &str, value: &str) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$setOnce": value }))
    }

    pub fn increment(&self, key: &str) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$inc": 1 }))
    }

    pub fn increment_by(&self, key: &str, by: f64) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$inc": by }))
    }

    pub fn multiply(&self, key: &str, by: f64) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$mul": by }))
    }

    pub fn max(&self, key: &str, value: f64) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$max": value }))
    }

    pub fn min(&self, key: &str, value: f64) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$min": value }))
    }

    pub fn push(&self, key: &str, values: &[&str]) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$push": values }))
    }

    pub fn push_unique(&self, key: &str, values: &[&str]) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$addToSet": values }))
    }

    pub fn pull(&self, key: &str, values: &[&str]) -> SdkResult<()> {
        self.custom_properties.put(key, json!({ "$pull": values }))
    }

    /// Number of property mutations waiting for [`Beacon::save`].
    pub fn pending_properties(&self) -> usize {
        self.custom_properties.len()
    }

    /// Send all pending property mutations as one request.
    pub async fn save(&self) -> SdkResult<()> {
        let custom = self.custom_properties.take();
        if custom.is_empty() || self.test_mode() {
            return Ok(());
        }

        let count = custom.len();
        let json = json!({ "custom": custom }).to_string();
        self.enqueue(vec![("user_details".to_string(), json)]).await;
        debug!(count, "Custom properties queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{harness, queued_params};

    #[test]
    fn test_picture_validation() {
        assert!(is_picture_valid(""));
        assert!(is_picture_valid("https://cdn.test/me.png"));
        assert!(is_picture_valid("https://cdn.test/me.JPEG?size=large"));
        assert!(!is_picture_valid("https://cdn.test/me.bmp"));
        assert!(!is_picture_valid("https://cdn.test/png"));
    }

    #[tokio::test]
    async fn test_invalid_picture_is_rejected_before_enqueue() {
        let h = harness().await;
        let details = UserDetails {
            picture_url: Some("https://cdn.test/me.txt".to_string()),
            ..UserDetails::default()
        };
        assert!(h.beacon.set_user_details(&details).await.is_err());
        assert_eq!(h.beacon.queue().count().await, 0);
    }

    #[tokio::test]
    async fn test_user_details_payload() {
        let h = harness().await;
        let details = UserDetails {
            name: Some("Ada".to_string()),
            birth_year: Some(1815),
            ..UserDetails::default()
        };
        h.beacon.set_user_details(&details).await.unwrap();

        let params = queued_params(&h.beacon).await;
        let json: Value = serde_json::from_str(&params[0]["user_details"]).unwrap();
        assert_eq!(json, json!({ "name": "Ada", "byear": 1815 }));
    }

    #[tokio::test]
    async fn test_save_sends_all_mutations_and_clears() {
        let h = harness().await;
        h.beacon.set_property("plan", "pro").unwrap();
        h.beacon.increment("logins").unwrap();
        h.beacon.increment_by("logins", 3.0).unwrap();
        h.beacon.push_unique("tags", &["a", "b"]).unwrap();
        assert_eq!(h.beacon.pending_properties(), 3);

        h.beacon.save().await.unwrap();
        assert_eq!(h.beacon.pending_properties(), 0);

        let params = queued_params(&h.beacon).await;
        let json: Value = serde_json::from_str(&params[0]["user_details"]).unwrap();
        assert_eq!(json["custom"]["plan"], "pro");
        assert_eq!(json["custom"]["logins"], json!({ "$inc": 3.0 }));
        assert_eq!(json["custom"]["tags"], json!({ "$addToSet": ["a", "b"] }));
    }

    #[tokio::test]
    async fn test_save_with_nothing_pending_is_noop() {
        let h = harness().await;
        h.beacon.save().await.unwrap();
        assert_eq!(h.beacon.queue().count().await, 0);
    }

    #[tokio::test]
    async fn test_empty_property_key_is_rejected() {
        let h = harness().await;
        assert!(h.beacon.set_property("", "x").is_err());
        assert_eq!(h.beacon.pending_properties(), 0);
    }
}

//! Location reporting.

use crate::{validation, Beacon, SdkResult};
use beacon_outbox::Params;

/// Where the user is. Every field is optional, but at least one is needed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Location {
    pub country_code: Option<String>,
    pub city: Option<String>,
    /// Latitude, longitude.
    pub gps: Option<(f64, f64)>,
    pub ip_address: Option<String>,
}

impl Beacon {
    pub async fn set_location(&self, location: &Location) -> SdkResult<()> {
        let mut params: Params = Vec::new();
        if let Some(country) = location.country_code.as_deref().filter(|s| !s.is_empty()) {
            params.push(("country_code".to_string(), country.to_string()));
        }
        if let Some(city) = location.city.as_deref().filter(|s| !s.is_empty()) {
            params.push(("city".to_string(), city.to_string()));
        }
        if let Some((lat, lon)) = location.gps {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(validation(format!("gps out of range: {lat},{lon}")));
            }
            params.push(("location".to_string(), format!("{lat},{lon}")));
        }
        if let Some(ip) = location.ip_address.as_deref().filter(|s| !s.is_empty()) {
            params.push(("ip_address".to_string(), ip.to_string()));
        }
        if params.is_empty() {
            return Err(validation("location has no fields set"));
        }
        if self.test_mode() {
            return Ok(());
        }

        self.enqueue(params).await;
        Ok(())
    }

    /// Ask the server to stop using location for this device.
    pub async fn disable_location(&self) -> SdkResult<()> {
        if self.test_mode() {
            return Ok(());
        }
        self.enqueue(vec![("location".to_string(), String::new())])
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{harness, queued_params};

    #[tokio::test]
    async fn test_set_location_sends_given_fields() {
        let h = harness().await;
        h.beacon
            .set_location(&Location {
                country_code: Some("EE".to_string()),
                city: Some("Tallinn".to_string()),
                gps: Some((59.43, 24.75)),
                ip_address: None,
            })
            .await
            .unwrap();

        let params = queued_params(&h.beacon).await;
        assert_eq!(params[0]["country_code"], "EE");
        assert_eq!(params[0]["city"], "Tallinn");
        assert_eq!(params[0]["location"], "59.43,24.75");
        assert!(!params[0].contains_key("ip_address"));
    }

    #[tokio::test]
    async fn test_empty_location_is_rejected() {
        let h = harness().await;
        assert!(h.beacon.set_location(&Location::default()).await.is_err());
        assert_eq!(h.beacon.queue().count().await, 0);
    }

    #[tokio::test]
    async fn test_disable_location_sends_empty_value() {
        let h = harness().await;
        h.beacon.disable_location().await.unwrap();
        let params = queued_params(&h.beacon).await;
        assert_eq!(params[0]["location"], "");
    }
}

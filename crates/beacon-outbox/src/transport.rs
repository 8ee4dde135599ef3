//! Transport contract and the reqwest implementation.

use crate::{DeliveryError, OutboxResult};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Accepted collector response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Performs GET/POST against the collector.
///
/// `Ok` means the collector accepted the request; any other outcome is a
/// [`DeliveryError`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_get(&self, url: &str) -> Result<TransportResponse, DeliveryError>;

    async fn send_post(&self, url: &str, body: &str) -> Result<TransportResponse, DeliveryError>;
}

/// HTTP transport over reqwest.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout_secs: u64) -> OutboxResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client })
    }

    async fn accept(response: reqwest::Response) -> Result<TransportResponse, DeliveryError> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(DeliveryError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if body.trim().is_empty() {
            return Err(DeliveryError::Rejected("empty response body".to_string()));
        }

        Ok(TransportResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_get(&self, url: &str) -> Result<TransportResponse, DeliveryError> {
        debug!(bytes = url.len(), "Sending GET");
        let response = self.client.get(url).send().await?;
        Self::accept(response).await
    }

    async fn send_post(&self, url: &str, body: &str) -> Result<TransportResponse, DeliveryError> {
        debug!(url = %url, bytes = body.len(), "Sending POST");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await?;
        Self::accept(response).await
    }
}

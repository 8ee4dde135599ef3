//! Shared fixtures for the SDK unit tests.

use crate::Beacon;
use async_trait::async_trait;
use beacon_config_and_utils::{Config, ManualClock, StaticMetrics};
use beacon_database::{Database, EventClass};
use beacon_events::Event;
use beacon_outbox::{DeliveryError, RequestPayload, Transport, TransportResponse};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
pub struct MockTransport {
    pub attempts: AtomicUsize,
    pub sent: Mutex<Vec<String>>,
    pub should_fail: AtomicBool,
    /// Per-send latency, in milliseconds.
    pub delay_ms: AtomicU64,
    /// Body returned on success, instead of the default result object.
    pub body: Mutex<Option<String>>,
}

impl MockTransport {
    async fn respond(&self, payload: &str) -> Result<TransportResponse, DeliveryError> {
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(DeliveryError::Transport("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(payload.to_string());
        let body = self
            .body
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| r#"{"result":"Success"}"#.to_string());
        Ok(TransportResponse { status: 200, body })
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send_get(&self, url: &str) -> Result<TransportResponse, DeliveryError> {
        self.respond(url).await
    }

    async fn send_post(&self, _url: &str, body: &str) -> Result<TransportResponse, DeliveryError> {
        self.respond(body).await
    }
}

pub struct Harness {
    pub beacon: Beacon,
    pub clock: Arc<ManualClock>,
    pub transport: Arc<MockTransport>,
}

pub fn test_config() -> Config {
    let mut config = Config::new("https://collector.test", "app-key");
    config.manual_session_handling = true;
    config
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: Config) -> Harness {
    harness_on(config, Arc::new(Database::open_in_memory().unwrap())).await
}

/// Harness over a caller-supplied database, for restart scenarios.
pub async fn harness_on(config: Config, database: Arc<Database>) -> Harness {
    let clock = Arc::new(ManualClock::at_epoch());
    let transport = Arc::new(MockTransport::default());
    let beacon = Beacon::builder(config)
        .database(database)
        .transport(transport.clone())
        .clock(clock.clone())
        .metrics(Arc::new(StaticMetrics::new().with("_os", "testos")))
        .start()
        .await
        .unwrap();
    Harness {
        beacon,
        clock,
        transport,
    }
}

/// Request parameters, whether sent as a query string or a JSON body.
pub fn payload_params(payload: &RequestPayload) -> HashMap<String, String> {
    params_of(payload.as_str())
}

/// Same as [`payload_params`], for what the mock transport received.
pub fn params_of(raw: &str) -> HashMap<String, String> {
    if raw.starts_with("http") {
        return url::Url::parse(raw)
            .unwrap()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
    }
    let json: HashMap<String, Value> = serde_json::from_str(raw).unwrap();
    json.into_iter()
        .map(|(k, v)| match v {
            Value::String(s) => (k, s),
            other => (k, other.to_string()),
        })
        .collect()
}

pub async fn queued_params(beacon: &Beacon) -> Vec<HashMap<String, String>> {
    beacon
        .queue()
        .snapshot()
        .await
        .iter()
        .map(|request| payload_params(&request.payload))
        .collect()
}

/// Flush one buffer and decode the events it produced.
pub async fn buffered_events(beacon: &Beacon, class: EventClass) -> Vec<Event> {
    let outcome = beacon.aggregator().flush(class).await.unwrap();
    let Some(request) = outcome.request() else {
        return Vec::new();
    };
    let params = payload_params(&request.payload);
    serde_json::from_str(&params["events"]).unwrap()
}

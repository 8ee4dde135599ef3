//! Event aggregator.
//!
//! Two buffers, one per [`EventClass`]. Each buffer is mirrored to its own
//! [`EventStore`] so buffered events survive a restart. Reaching a buffer's
//! threshold flushes it immediately; flushing clears the buffer before the
//! batch is enqueued, so a batch is never produced twice.

use crate::{Event, EventResult, NewEvent, Segmentation};
use beacon_database::{EventClass, EventRecord, EventStore, RecordStore};
use beacon_outbox::{Request, RequestBuilder, RequestQueue};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of recording one event.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordOutcome {
    /// Buffered; `pending` events now wait in its buffer.
    Buffered { pending: usize },
    /// Buffered and the buffer hit its threshold.
    Flushed(Request),
}

/// Result of flushing a buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum FlushOutcome {
    /// Nothing was buffered.
    Empty,
    Enqueued(Request),
}

impl FlushOutcome {
    pub fn request(&self) -> Option<&Request> {
        match self {
            Self::Empty => None,
            Self::Enqueued(request) => Some(request),
        }
    }
}

struct Buffer {
    store: EventStore,
    threshold: usize,
    events: Vec<(i64, Event)>,
}

/// Buffers events and turns full buffers into requests.
pub struct EventAggregator {
    views: Mutex<Buffer>,
    others: Mutex<Buffer>,
    builder: Arc<RequestBuilder>,
    queue: Arc<RequestQueue>,
}

impl EventAggregator {
    pub fn new(
        view_store: EventStore,
        other_store: EventStore,
        builder: Arc<RequestBuilder>,
        queue: Arc<RequestQueue>,
    ) -> Self {
        let config = builder.config();
        let views = Buffer {
            store: view_store,
            threshold: config.event_view_send_threshold.max(1),
            events: Vec::new(),
        };
        let others = Buffer {
            store: other_store,
            threshold: config.event_non_view_send_threshold.max(1),
            events: Vec::new(),
        };
        Self {
            views: Mutex::new(views),
            others: Mutex::new(others),
            builder,
            queue,
        }
    }

    fn buffer(&self, class: EventClass) -> &Mutex<Buffer> {
        match class {
            EventClass::View => &self.views,
            EventClass::NonView => &self.others,
        }
    }

    /// Reload both buffers from their stores. Returns (views, non-views).
    pub async fn initialize(&self) -> (usize, usize) {
        let views = self.reload(EventClass::View).await;
        let others = self.reload(EventClass::NonView).await;
        info!(views, others, "Loaded buffered events");
        (views, others)
    }

    async fn reload(&self, class: EventClass) -> usize {
        let mut buffer = self.buffer(class).lock().await;
        let mut events = Vec::new();
        for record in buffer.store.load_all() {
            match decode(&record) {
                Ok(event) => events.push((record.id, event)),
                Err(e) => {
                    warn!(event_id = record.id, error = %e, "Dropping unreadable event");
                    buffer.store.remove(record.id);
                }
            }
        }
        buffer.events = events;
        buffer.events.len()
    }

    /// Validate, timestamp, buffer, and flush if the threshold is reached.
    pub async fn record_event(&self, new_event: NewEvent) -> EventResult<RecordOutcome> {
        let event = new_event.stamp(self.builder.timestamper().next())?;
        let class = event.class();

        let batch = {
            let mut buffer = self.buffer(class).lock().await;
            let id = buffer.store.generate_id();
            if !buffer.store.save(&encode(id, class, &event)?) {
                warn!(key = %event.key, "Event kept in memory only");
            }
            debug!(key = %event.key, class = class.as_str(), "Recorded event");
            buffer.events.push((id, event));

            if buffer.events.len() < buffer.threshold {
                return Ok(RecordOutcome::Buffered {
                    pending: buffer.events.len(),
                });
            }
            take(&mut buffer)
        };

        let request = self.enqueue_batch(class, batch).await?;
        Ok(RecordOutcome::Flushed(request))
    }

    /// Flush one buffer into a single request.
    pub async fn flush(&self, class: EventClass) -> EventResult<FlushOutcome> {
        let batch = {
            let mut buffer = self.buffer(class).lock().await;
            if buffer.events.is_empty() {
                return Ok(FlushOutcome::Empty);
            }
            take(&mut buffer)
        };
        let request = self.enqueue_batch(class, batch).await?;
        Ok(FlushOutcome::Enqueued(request))
    }

    /// Flush non-view events, then view events.
    pub async fn flush_all(&self) -> EventResult<Vec<Request>> {
        let mut requests = Vec::new();
        for class in [EventClass::NonView, EventClass::View] {
            if let FlushOutcome::Enqueued(request) = self.flush(class).await? {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    async fn enqueue_batch(&self, class: EventClass, batch: Vec<Event>) -> EventResult<Request> {
        let events = serde_json::to_string(&batch)?;
        let payload = self.builder.build(vec![("events".to_string(), events)]);
        let request = self.queue.enqueue(payload).await;
        info!(
            class = class.as_str(),
            count = batch.len(),
            request_id = request.id,
            "Flushed events"
        );
        Ok(request)
    }

    /// Number of buffered (view, non-view) events.
    pub async fn pending(&self) -> (usize, usize) {
        let views = self.views.lock().await.events.len();
        let others = self.others.lock().await.events.len();
        (views, others)
    }

    /// Drop every buffered event without sending it.
    pub async fn clear(&self) {
        for class in [EventClass::View, EventClass::NonView] {
            let mut buffer = self.buffer(class).lock().await;
            buffer.events.clear();
            buffer.store.remove_all();
        }
    }
}

/// Empty the buffer in memory and in the store, returning its events.
fn take(buffer: &mut Buffer) -> Vec<Event> {
    buffer.store.remove_all();
    std::mem::take(&mut buffer.events)
        .into_iter()
        .map(|(_, event)| event)
        .collect()
}

fn encode(id: i64, class: EventClass, event: &Event) -> EventResult<EventRecord> {
    let segmentation = if event.segmentation.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&event.segmentation)?)
    };
    let mut bare = event.clone();
    bare.segmentation = Segmentation::new();

    Ok(EventRecord {
        id,
        class,
        payload: serde_json::to_string(&bare)?,
        segmentation,
        created_at: Utc::now(),
    })
}

fn decode(record: &EventRecord) -> EventResult<Event> {
    let mut event: Event = serde_json::from_str(&record.payload)?;
    if let Some(segmentation) = &record.segmentation {
        event.segmentation = serde_json::from_str(segmentation)?;
    }
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{keys, EventError, SegmentValue};
    use beacon_config_and_utils::{Config, ManualClock, SharedClock, Timestamper};
    use beacon_database::{Database, RequestStore};
    use beacon_outbox::RequestPayload;
    use chrono::FixedOffset;

    struct Harness {
        db: Arc<Database>,
        builder: Arc<RequestBuilder>,
        queue: Arc<RequestQueue>,
        aggregator: EventAggregator,
    }

    fn harness_with(db: Arc<Database>, config: Config) -> Harness {
        let clock: SharedClock = Arc::new(ManualClock::at_epoch());
        let stamper = Arc::new(Timestamper::with_offset(
            clock.clone(),
            FixedOffset::east_opt(0).unwrap(),
        ));
        let builder = Arc::new(RequestBuilder::new(
            Arc::new(config),
            stamper,
            "device-1".to_string(),
        ));
        let queue = Arc::new(RequestQueue::new(
            Arc::new(RequestStore::new(db.clone())),
            clock,
            100,
        ));
        let aggregator = EventAggregator::new(
            EventStore::new(db.clone(), EventClass::View),
            EventStore::new(db.clone(), EventClass::NonView),
            builder.clone(),
            queue.clone(),
        );
        Harness {
            db,
            builder,
            queue,
            aggregator,
        }
    }

    fn harness(view_threshold: usize, other_threshold: usize) -> Harness {
        let mut config = Config::new("https://collector.test", "app-key");
        config.event_view_send_threshold = view_threshold;
        config.event_non_view_send_threshold = other_threshold;
        harness_with(Arc::new(Database::open_in_memory().unwrap()), config)
    }

    fn view(name: &str) -> NewEvent {
        NewEvent::new(keys::VIEW).segmentation(Segmentation::new().with("name", name))
    }

    fn events_of(request: &Request) -> Vec<Event> {
        let raw = match &request.payload {
            RequestPayload::Get { url } => url::Url::parse(url)
                .unwrap()
                .query_pairs()
                .find(|(k, _)| k == "events")
                .map(|(_, v)| v.into_owned())
                .unwrap(),
            RequestPayload::Post { body } => {
                let json: serde_json::Value = serde_json::from_str(body).unwrap();
                json["events"].as_str().unwrap().to_string()
            }
        };
        serde_json::from_str(&raw).unwrap()
    }

    #[tokio::test]
    async fn test_view_threshold_flush() {
        let h = harness(3, 100);

        h.aggregator.record_event(view("a")).await.unwrap();
        h.aggregator.record_event(view("b")).await.unwrap();
        assert_eq!(h.queue.count().await, 0);

        let outcome = h.aggregator.record_event(view("c")).await.unwrap();
        let RecordOutcome::Flushed(request) = outcome else {
            panic!("expected flush");
        };

        assert_eq!(h.queue.count().await, 1);
        let events = events_of(&request);
        assert_eq!(events.len(), 3);
        let names: Vec<_> = events
            .iter()
            .map(|e| e.segmentation.get("name").cloned().unwrap())
            .collect();
        assert_eq!(names, vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(h.aggregator.pending().await, (0, 0));
    }

    #[tokio::test]
    async fn test_view_and_other_buffers_are_independent() {
        let h = harness(2, 2);
        h.aggregator.record_event(view("a")).await.unwrap();
        let outcome = h
            .aggregator
            .record_event(NewEvent::new("purchase"))
            .await
            .unwrap();

        assert_eq!(outcome, RecordOutcome::Buffered { pending: 1 });
        assert_eq!(h.aggregator.pending().await, (1, 1));
        assert_eq!(h.queue.count().await, 0);
    }

    #[tokio::test]
    async fn test_flush_empty_buffer_is_noop() {
        let h = harness(10, 10);
        assert_eq!(
            h.aggregator.flush(EventClass::View).await.unwrap(),
            FlushOutcome::Empty
        );
        assert!(h.aggregator.flush_all().await.unwrap().is_empty());
        assert_eq!(h.queue.count().await, 0);
    }

    #[tokio::test]
    async fn test_flush_all_sends_non_view_first() {
        let h = harness(10, 10);
        h.aggregator.record_event(view("home")).await.unwrap();
        h.aggregator.record_event(NewEvent::new("tap")).await.unwrap();

        let requests = h.aggregator.flush_all().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(events_of(&requests[0])[0].key, "tap");
        assert_eq!(events_of(&requests[1])[0].key, keys::VIEW);
        assert_eq!(h.aggregator.pending().await, (0, 0));
    }

    #[tokio::test]
    async fn test_empty_key_changes_nothing() {
        let h = harness(1, 1);
        assert!(h.aggregator.record_event(NewEvent::new("")).await.is_err());
        assert_eq!(h.aggregator.pending().await, (0, 0));
        assert_eq!(h.queue.count().await, 0);
    }

    #[tokio::test]
    async fn test_buffers_survive_restart() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = Config::new("https://collector.test", "app-key");
        {
            let h = harness_with(db.clone(), config.clone());
            h.aggregator
                .record_event(
                    NewEvent::new("purchase")
                        .sum(3.5)
                        .segmentation(Segmentation::new().with("item", "sword")),
                )
                .await
                .unwrap();
            h.aggregator.record_event(view("home")).await.unwrap();
        }

        let h = harness_with(db, config);
        assert_eq!(h.aggregator.initialize().await, (1, 1));

        let requests = h.aggregator.flush_all().await.unwrap();
        let purchase = &events_of(&requests[0])[0];
        assert_eq!(purchase.sum, Some(3.5));
        assert_eq!(purchase.segmentation.get("item"), Some(&"sword".into()));
    }

    #[tokio::test]
    async fn test_non_finite_segment_is_refused_and_floats_survive_restart() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = Config::new("https://collector.test", "app-key");
        {
            let h = harness_with(db.clone(), config.clone());
            let nan = NewEvent::new("e").segmentation(
                Segmentation::new().with("v", SegmentValue::parse_literal("NaN")),
            );
            h.aggregator.record_event(nan).await.unwrap();

            let refused = NewEvent::new("e")
                .segmentation(Segmentation::new().with("v", f64::INFINITY));
            assert!(matches!(
                h.aggregator.record_event(refused).await,
                Err(EventError::NonFinite(_))
            ));
            h.aggregator
                .record_event(
                    NewEvent::new("e")
                        .segmentation(Segmentation::new().with("ratio", vec![0.25, 2.0])),
                )
                .await
                .unwrap();
            assert_eq!(h.aggregator.pending().await, (0, 2));
        }

        let h = harness_with(db, config);
        assert_eq!(h.aggregator.initialize().await, (0, 2));
        let requests = h.aggregator.flush_all().await.unwrap();
        let events = events_of(&requests[0]);
        assert_eq!(events[0].segmentation.get("v"), Some(&"NaN".into()));
        assert_eq!(
            events[1].segmentation.get("ratio"),
            Some(&SegmentValue::from(vec![0.25, 2.0]))
        );
    }

    #[tokio::test]
    async fn test_flush_clears_persisted_events() {
        let h = harness(10, 10);
        h.aggregator.record_event(NewEvent::new("tap")).await.unwrap();
        h.aggregator.flush(EventClass::NonView).await.unwrap();

        let store = EventStore::new(h.db.clone(), EventClass::NonView);
        assert!(store.load_all().is_empty());
    }

    #[tokio::test]
    async fn test_event_timestamps_strictly_increase() {
        let h = harness(10_000, 10_000);
        for _ in 0..1000 {
            h.aggregator.record_event(NewEvent::new("tick")).await.unwrap();
        }
        let requests = h.aggregator.flush_all().await.unwrap();
        let events = events_of(&requests[0]);
        assert_eq!(events.len(), 1000);
        for pair in events.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
        }
        assert_eq!(h.builder.device_id(), "device-1");
    }
}

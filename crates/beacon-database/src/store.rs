//! Durable record stores.
//!
//! These wrap [`Database`] with the failure semantics the queue and the
//! aggregator rely on: no operation returns an error. A storage failure is
//! logged and the caller gets `false`, an empty list, or `0`. Anything lost
//! this way is lost across restarts only; the in-memory state keeps going.

use crate::{Database, EventClass, EventRecord, RequestRecord};
use std::sync::Arc;
use tracing::{error, warn};

/// Keyed, ordered persistence for one kind of record.
pub trait RecordStore: Send + Sync {
    type Record;

    /// Persist a record under its own id. Returns false on failure.
    fn save(&self, record: &Self::Record) -> bool;

    /// All records, ordered by id ascending. Empty on failure.
    fn load_all(&self) -> Vec<Self::Record>;

    /// Delete one record. Missing ids are ignored.
    fn remove(&self, id: i64);

    /// Delete every record.
    fn remove_all(&self);

    /// Next unique id for this store. Returns 0 on failure.
    fn generate_id(&self) -> i64;
}

const REQUEST_SEQUENCE: &str = "requests";
const EVENT_SEQUENCE: &str = "events";

/// Store backing the request queue.
#[derive(Clone)]
pub struct RequestStore {
    db: Arc<Database>,
}

impl RequestStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

impl RecordStore for RequestStore {
    type Record = RequestRecord;

    fn save(&self, record: &RequestRecord) -> bool {
        match self.db.insert_request(record) {
            Ok(()) => true,
            Err(e) => {
                error!(request_id = record.id, error = %e, "Failed to persist request");
                false
            }
        }
    }

    fn load_all(&self) -> Vec<RequestRecord> {
        self.db.list_requests().unwrap_or_else(|e| {
            error!(error = %e, "Failed to load requests");
            Vec::new()
        })
    }

    fn remove(&self, id: i64) {
        if let Err(e) = self.db.delete_request(id) {
            warn!(request_id = id, error = %e, "Failed to delete request");
        }
    }

    fn remove_all(&self) {
        if let Err(e) = self.db.delete_all_requests() {
            warn!(error = %e, "Failed to delete requests");
        }
    }

    fn generate_id(&self) -> i64 {
        self.db.next_id(REQUEST_SEQUENCE).unwrap_or_else(|e| {
            error!(error = %e, "Failed to generate request id");
            0
        })
    }
}

/// Store backing one event buffer (view or non-view).
///
/// Both classes draw ids from the same sequence.
#[derive(Clone)]
pub struct EventStore {
    db: Arc<Database>,
    class: EventClass,
}

impl EventStore {
    pub fn new(db: Arc<Database>, class: EventClass) -> Self {
        Self { db, class }
    }

    pub fn class(&self) -> EventClass {
        self.class
    }
}

impl RecordStore for EventStore {
    type Record = EventRecord;

    fn save(&self, record: &EventRecord) -> bool {
        if record.class != self.class {
            warn!(
                event_id = record.id,
                expected = self.class.as_str(),
                got = record.class.as_str(),
                "Event saved to the wrong buffer"
            );
            return false;
        }
        match self.db.insert_event(record) {
            Ok(()) => true,
            Err(e) => {
                error!(event_id = record.id, error = %e, "Failed to persist event");
                false
            }
        }
    }

    fn load_all(&self) -> Vec<EventRecord> {
        self.db.list_events(self.class).unwrap_or_else(|e| {
            error!(class = self.class.as_str(), error = %e, "Failed to load events");
            Vec::new()
        })
    }

    fn remove(&self, id: i64) {
        if let Err(e) = self.db.delete_event(id) {
            warn!(event_id = id, error = %e, "Failed to delete event");
        }
    }

    fn remove_all(&self) {
        if let Err(e) = self.db.delete_events(self.class) {
            warn!(class = self.class.as_str(), error = %e, "Failed to delete events");
        }
    }

    fn generate_id(&self) -> i64 {
        self.db.next_id(EVENT_SEQUENCE).unwrap_or_else(|e| {
            error!(error = %e, "Failed to generate event id");
            0
        })
    }
}

/// Key/value settings with the same swallow-and-log behaviour.
#[derive(Clone)]
pub struct Settings {
    db: Arc<Database>,
}

impl Settings {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.db.get_setting(key).unwrap_or_else(|e| {
            warn!(key, error = %e, "Failed to read setting");
            None
        })
    }

    pub fn set(&self, key: &str, value: &str) -> bool {
        match self.db.set_setting(key, value) {
            Ok(()) => true,
            Err(e) => {
                warn!(key, error = %e, "Failed to write setting");
                false
            }
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.db.delete_setting(key) {
            warn!(key, error = %e, "Failed to delete setting");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn db() -> Arc<Database> {
        Arc::new(Database::open_in_memory().unwrap())
    }

    fn request(store: &RequestStore) -> RequestRecord {
        RequestRecord {
            id: store.generate_id(),
            is_get: false,
            url: None,
            body: Some("{}".to_string()),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_request_store_roundtrip() {
        let store = RequestStore::new(db());
        let first = request(&store);
        let second = request(&store);
        assert!(second.id > first.id);

        assert!(store.save(&first));
        assert!(store.save(&second));

        let loaded = store.load_all();
        let ids: Vec<i64> = loaded.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        assert_eq!(loaded[0].body.as_deref(), Some("{}"));
        assert!(!loaded[0].is_get);
    }

    #[test]
    fn test_request_store_save_duplicate_returns_false() {
        let store = RequestStore::new(db());
        let record = request(&store);
        assert!(store.save(&record));
        assert!(!store.save(&record));
        assert_eq!(store.load_all().len(), 1);
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let store = RequestStore::new(db());
        store.remove(12345);
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_remove_all() {
        let store = RequestStore::new(db());
        for _ in 0..3 {
            let record = request(&store);
            store.save(&record);
        }
        store.remove_all();
        assert!(store.load_all().is_empty());
    }

    #[test]
    fn test_event_store_rejects_other_class() {
        let db = db();
        let views = EventStore::new(db.clone(), EventClass::View);
        let others = EventStore::new(db, EventClass::NonView);

        let record = EventRecord {
            id: others.generate_id(),
            class: EventClass::NonView,
            payload: "{}".to_string(),
            segmentation: None,
            created_at: Utc::now(),
        };
        assert!(!views.save(&record));
        assert!(others.save(&record));
        assert!(views.load_all().is_empty());
        assert_eq!(others.load_all().len(), 1);
    }

    #[test]
    fn test_event_ids_are_shared_across_classes() {
        let db = db();
        let views = EventStore::new(db.clone(), EventClass::View);
        let others = EventStore::new(db, EventClass::NonView);
        let a = views.generate_id();
        let b = others.generate_id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_settings() {
        let settings = Settings::new(db());
        assert_eq!(settings.get("first_launch"), None);
        assert!(settings.set("first_launch", "done"));
        assert_eq!(settings.get("first_launch").as_deref(), Some("done"));
        settings.remove("first_launch");
        assert_eq!(settings.get("first_launch"), None);
    }
}

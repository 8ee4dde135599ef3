//! Database connection and query operations.

use crate::{migrations, DatabaseResult, EventClass, EventRecord, RequestRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Database wrapper with query methods.
///
/// The connection sits behind a mutex so one `Arc<Database>` can be shared by
/// the request queue, both event buffers and the settings store.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, running migrations if needed.
    pub fn open(path: &Path) -> DatabaseResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        migrations::run_migrations(&conn)?;
        debug!(path = %path.display(), "Database opened");

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database for testing.
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ==========================================
    // Id sequences
    // ==========================================

    /// Next value of a named, persisted sequence. Starts at 1.
    pub fn next_id(&self, sequence: &str) -> DatabaseResult<i64> {
        let id = self.conn().query_row(
            "INSERT INTO id_sequences (name, last_id) VALUES (?1, 1)
             ON CONFLICT(name) DO UPDATE SET last_id = last_id + 1
             RETURNING last_id",
            params![sequence],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    // ==========================================
    // Requests
    // ==========================================

    /// Insert a request. Fails if the id is already taken.
    pub fn insert_request(&self, request: &RequestRecord) -> DatabaseResult<()> {
        self.conn().execute(
            "INSERT INTO requests (id, is_get, url, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request.id,
                request.is_get,
                request.url,
                request.body,
                request.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// List all requests, oldest first.
    pub fn list_requests(&self) -> DatabaseResult<Vec<RequestRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, is_get, url, body, created_at FROM requests ORDER BY id ASC",
        )?;

        let requests = stmt
            .query_map([], |row| {
                Ok(RequestRecord {
                    id: row.get(0)?,
                    is_get: row.get(1)?,
                    url: row.get(2)?,
                    body: row.get(3)?,
                    created_at: parse_datetime(row.get::<_, String>(4)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    /// Delete a request by id. Returns false if it did not exist.
    pub fn delete_request(&self, id: i64) -> DatabaseResult<bool> {
        let count = self
            .conn()
            .execute("DELETE FROM requests WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    /// Delete every request.
    pub fn delete_all_requests(&self) -> DatabaseResult<usize> {
        let count = self.conn().execute("DELETE FROM requests", [])?;
        Ok(count)
    }

    /// Number of persisted requests.
    pub fn count_requests(&self) -> DatabaseResult<usize> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM requests", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ==========================================
    // Events
    // ==========================================

    /// Insert an event and its segmentation in one transaction.
    pub fn insert_event(&self, event: &EventRecord) -> DatabaseResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO events (id, class, payload, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                event.id,
                event.class.as_str(),
                event.payload,
                event.created_at.to_rfc3339(),
            ],
        )?;

        if let Some(segmentation) = &event.segmentation {
            tx.execute(
                "INSERT INTO event_segments (event_id, payload) VALUES (?1, ?2)",
                params![event.id, segmentation],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// List the events of one class, oldest first.
    pub fn list_events(&self, class: EventClass) -> DatabaseResult<Vec<EventRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT e.id, e.payload, s.payload, e.created_at
             FROM events e
             LEFT JOIN event_segments s ON s.event_id = e.id
             WHERE e.class = ?1
             ORDER BY e.id ASC",
        )?;

        let events = stmt
            .query_map(params![class.as_str()], |row| {
                Ok(EventRecord {
                    id: row.get(0)?,
                    class,
                    payload: row.get(1)?,
                    segmentation: row.get(2)?,
                    created_at: parse_datetime(row.get::<_, String>(3)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Delete an event (and its segmentation) by id.
    pub fn delete_event(&self, id: i64) -> DatabaseResult<bool> {
        let count = self
            .conn()
            .execute("DELETE FROM events WHERE id = ?1", params![id])?;
        Ok(count > 0)
    }

    /// Delete every event of one class.
    pub fn delete_events(&self, class: EventClass) -> DatabaseResult<usize> {
        let count = self.conn().execute(
            "DELETE FROM events WHERE class = ?1",
            params![class.as_str()],
        )?;
        Ok(count)
    }

    // ==========================================
    // Settings
    // ==========================================

    /// Get a setting value.
    pub fn get_setting(&self, key: &str) -> DatabaseResult<Option<String>> {
        let result = self.conn().query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a setting value.
    pub fn set_setting(&self, key: &str, value: &str) -> DatabaseResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn().execute(
            "INSERT INTO settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, now],
        )?;
        Ok(())
    }

    /// Delete a setting.
    pub fn delete_setting(&self, key: &str) -> DatabaseResult<bool> {
        let count = self
            .conn()
            .execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(count > 0)
    }
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn request(id: i64) -> RequestRecord {
        RequestRecord {
            id,
            is_get: id % 2 == 0,
            url: Some(format!("https://collector.test/i?n={id}")),
            body: None,
            created_at: Utc::now(),
        }
    }

    fn event(id: i64, class: EventClass, segmentation: Option<&str>) -> EventRecord {
        EventRecord {
            id,
            class,
            payload: format!(r#"{{"key":"e{id}","count":1}}"#),
            segmentation: segmentation.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_next_id_is_monotonic_per_sequence() {
        let db = create_test_db();
        assert_eq!(db.next_id("requests").unwrap(), 1);
        assert_eq!(db.next_id("requests").unwrap(), 2);
        assert_eq!(db.next_id("events").unwrap(), 1);
        assert_eq!(db.next_id("requests").unwrap(), 3);
    }

    #[test]
    fn test_request_crud_keeps_insertion_order() {
        let db = create_test_db();
        for id in [3, 1, 2] {
            db.insert_request(&request(id)).unwrap();
        }

        let ids: Vec<i64> = db.list_requests().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(db.count_requests().unwrap(), 3);

        assert!(db.delete_request(2).unwrap());
        assert!(!db.delete_request(2).unwrap());
        assert_eq!(db.count_requests().unwrap(), 2);

        assert_eq!(db.delete_all_requests().unwrap(), 2);
        assert!(db.list_requests().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_request_id_is_rejected() {
        let db = create_test_db();
        db.insert_request(&request(1)).unwrap();
        assert!(db.insert_request(&request(1)).is_err());
    }

    #[test]
    fn test_events_are_split_by_class_and_keep_segmentation() {
        let db = create_test_db();
        db.insert_event(&event(1, EventClass::View, Some(r#"{"name":"home"}"#)))
            .unwrap();
        db.insert_event(&event(2, EventClass::NonView, None)).unwrap();
        db.insert_event(&event(3, EventClass::View, None)).unwrap();

        let views = db.list_events(EventClass::View).unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].segmentation.as_deref(), Some(r#"{"name":"home"}"#));
        assert_eq!(views[1].segmentation, None);

        let others = db.list_events(EventClass::NonView).unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, 2);
    }

    #[test]
    fn test_delete_event_cascades_to_segments() {
        let db = create_test_db();
        db.insert_event(&event(1, EventClass::NonView, Some("{}"))).unwrap();
        assert!(db.delete_event(1).unwrap());

        let orphans: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM event_segments", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_delete_events_only_touches_one_class() {
        let db = create_test_db();
        db.insert_event(&event(1, EventClass::View, None)).unwrap();
        db.insert_event(&event(2, EventClass::NonView, None)).unwrap();

        assert_eq!(db.delete_events(EventClass::View).unwrap(), 1);
        assert!(db.list_events(EventClass::View).unwrap().is_empty());
        assert_eq!(db.list_events(EventClass::NonView).unwrap().len(), 1);
    }

    #[test]
    fn test_settings_crud() {
        let db = create_test_db();
        assert_eq!(db.get_setting("device_id").unwrap(), None);

        db.set_setting("device_id", "a").unwrap();
        db.set_setting("device_id", "b").unwrap();
        assert_eq!(db.get_setting("device_id").unwrap().as_deref(), Some("b"));

        assert!(db.delete_setting("device_id").unwrap());
        assert_eq!(db.get_setting("device_id").unwrap(), None);
    }

    #[test]
    fn test_file_database_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("beacon.sqlite");

        {
            let db = Database::open(&path).unwrap();
            db.insert_request(&request(7)).unwrap();
            db.next_id("requests").unwrap();
        }

        let db = Database::open(&path).unwrap();
        let requests = db.list_requests().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, 7);
        assert_eq!(db.next_id("requests").unwrap(), 2);
    }
}

//! Bounded request queue backed by the durable request store.

use crate::{OutboxError, OutboxResult, Request, RequestPayload};
use beacon_config_and_utils::SharedClock;
use beacon_database::{RecordStore, RequestRecord};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type SharedRequestStore = Arc<dyn RecordStore<Record = RequestRecord>>;

/// FIFO of not-yet-delivered requests.
///
/// Holds at most `capacity` entries; enqueueing into a full queue evicts the
/// oldest entry without delivering it. Every mutation is mirrored to the
/// store before the call returns.
pub struct RequestQueue {
    store: SharedRequestStore,
    clock: SharedClock,
    capacity: usize,
    pending: Mutex<VecDeque<Request>>,
}

impl RequestQueue {
    pub fn new(store: SharedRequestStore, clock: SharedClock, capacity: usize) -> Self {
        Self {
            store,
            clock,
            capacity: capacity.max(1),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Load persisted requests, oldest first. Returns how many were loaded.
    ///
    /// Replaces whatever is in memory. Records that cannot be decoded are
    /// dropped from the store, and anything over capacity is evicted oldest
    /// first.
    pub async fn initialize(&self) -> usize {
        let mut loaded = VecDeque::new();
        for record in self.store.load_all() {
            let id = record.id;
            match Request::try_from(record) {
                Ok(request) => loaded.push_back(request),
                Err(e) => {
                    warn!(request_id = id, error = %e, "Dropping unreadable request");
                    self.store.remove(id);
                }
            }
        }

        while loaded.len() > self.capacity {
            if let Some(evicted) = loaded.pop_front() {
                warn!(request_id = evicted.id, "Evicting request over capacity");
                self.store.remove(evicted.id);
            }
        }

        let count = loaded.len();
        *self.pending.lock().await = loaded;
        info!(count, "Loaded pending requests");
        count
    }

    /// Append a request, evicting the oldest one if the queue is full.
    pub async fn enqueue(&self, payload: RequestPayload) -> Request {
        let mut pending = self.pending.lock().await;

        if pending.len() >= self.capacity {
            if let Some(evicted) = pending.pop_front() {
                self.store.remove(evicted.id);
                warn!(
                    request_id = evicted.id,
                    capacity = self.capacity,
                    "Queue full, evicted oldest request"
                );
            }
        }

        // Ids stay increasing in memory even when the store cannot hand one out.
        let floor = pending.back().map(|r| r.id + 1).unwrap_or(1);
        let id = self.store.generate_id().max(floor);

        let request = Request {
            id,
            payload,
            created_at: self.clock.now(),
        };

        if !self.store.save(&request.to_record()) {
            warn!(request_id = id, "Request kept in memory only");
        }
        pending.push_back(request.clone());

        debug!(request_id = id, is_get = request.is_get(), queued = pending.len(), "Enqueued request");
        request
    }

    /// Remove and return the oldest request.
    pub async fn dequeue(&self) -> OutboxResult<Request> {
        let mut pending = self.pending.lock().await;
        let request = pending.pop_front().ok_or(OutboxError::EmptyQueue)?;
        self.store.remove(request.id);
        debug!(request_id = request.id, "Dequeued request");
        Ok(request)
    }

    /// Remove a request by id. Returns false if it was not queued.
    pub async fn remove(&self, id: i64) -> bool {
        let mut pending = self.pending.lock().await;
        let Some(position) = pending.iter().position(|r| r.id == id) else {
            return false;
        };
        pending.remove(position);
        self.store.remove(id);
        debug!(request_id = id, "Removed request");
        true
    }

    pub async fn count(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Copy of the current contents, oldest first.
    pub async fn snapshot(&self) -> Vec<Request> {
        self.pending.lock().await.iter().cloned().collect()
    }

    /// Empty both memory and store.
    pub async fn clear(&self) {
        let mut pending = self.pending.lock().await;
        let count = pending.len();
        pending.clear();
        self.store.remove_all();
        info!(count, "Cleared request queue");
    }
}

//! Delivery engine: drains the request queue against a transport.

use crate::{DeliveryError, Request, RequestPayload, RequestQueue, Transport, TransportResponse};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Requests in the snapshot taken at pass start.
    pub snapshot: usize,
    /// Requests delivered and removed.
    pub delivered: usize,
    /// Requests left queued after exhausting their attempts.
    pub failed: usize,
    /// Total transport calls made.
    pub attempts: usize,
    /// Another pass was already running, so nothing was done.
    pub skipped: bool,
}

/// Drains the queue with a fixed number of attempts per request.
///
/// Each pass works on a snapshot, so requests enqueued mid-pass wait for the
/// next one. A request that fails every attempt stays queued and the pass
/// moves on.
pub struct DeliveryEngine {
    queue: Arc<RequestQueue>,
    transport: Arc<dyn Transport>,
    endpoint: String,
    max_attempts: u32,
    draining: AtomicBool,
}

struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl DeliveryEngine {
    pub fn new(
        queue: Arc<RequestQueue>,
        transport: Arc<dyn Transport>,
        endpoint: String,
        max_attempts: u32,
    ) -> Self {
        Self {
            queue,
            transport,
            endpoint,
            max_attempts: max_attempts.max(1),
            draining: AtomicBool::new(false),
        }
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    /// Run one drain pass.
    pub async fn process_queue(&self) -> DrainReport {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Drain already in progress, skipping");
            return DrainReport {
                skipped: true,
                ..DrainReport::default()
            };
        }
        let _guard = DrainGuard(&self.draining);

        let snapshot = self.queue.snapshot().await;
        let mut report = DrainReport {
            snapshot: snapshot.len(),
            ..DrainReport::default()
        };
        if snapshot.is_empty() {
            return report;
        }

        for request in &snapshot {
            let mut delivered = false;

            for attempt in 1..=self.max_attempts {
                report.attempts += 1;
                match self.send(request).await {
                    Ok(response) => {
                        debug!(
                            request_id = request.id,
                            attempt,
                            status = response.status,
                            "Request delivered"
                        );
                        delivered = true;
                        break;
                    }
                    Err(e) => {
                        warn!(
                            request_id = request.id,
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %e,
                            "Delivery attempt failed"
                        );
                    }
                }
            }

            if delivered {
                // Already gone if a concurrent clear or eviction got there first.
                self.queue.remove(request.id).await;
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        info!(
            snapshot = report.snapshot,
            delivered = report.delivered,
            failed = report.failed,
            attempts = report.attempts,
            "Drain pass complete"
        );
        report
    }

    async fn send(&self, request: &Request) -> Result<TransportResponse, DeliveryError> {
        match &request.payload {
            RequestPayload::Get { url } => self.transport.send_get(url).await,
            RequestPayload::Post { body } => self.transport.send_post(&self.endpoint, body).await,
        }
    }
}

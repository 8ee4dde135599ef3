//! Session timer.
//!
//! Owns the session state (`initiated`, time of the last session request).
//! While a session runs, each tick flushes buffered events, sends an extend
//! request, and runs one drain pass.

use crate::{SessionError, SessionResult};
use beacon_config_and_utils::SharedMetrics;
use beacon_events::EventAggregator;
use beacon_outbox::{DeliveryEngine, DrainReport, Params, Request, RequestBuilder, RequestQueue};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// No session was running, so nothing happened.
    pub idle: bool,
    /// Event batches enqueued before extending.
    pub flushed: usize,
    /// The extend request that was enqueued.
    pub extended: Option<i64>,
    pub drain: DrainReport,
}

#[derive(Debug, Default)]
struct SessionState {
    initiated: bool,
    last_request_at: Option<DateTime<Utc>>,
}

/// A running timer task and its stop signal.
struct TimerTask {
    handle: JoinHandle<()>,
    stop: watch::Sender<bool>,
}

/// Drives begin/extend/end and the periodic tick.
pub struct SessionTimer {
    builder: Arc<RequestBuilder>,
    queue: Arc<RequestQueue>,
    aggregator: Arc<EventAggregator>,
    delivery: Arc<DeliveryEngine>,
    metrics: SharedMetrics,
    interval: Duration,
    manual: bool,
    state: Mutex<SessionState>,
    task: Mutex<Option<TimerTask>>,
}

impl SessionTimer {
    pub fn new(
        builder: Arc<RequestBuilder>,
        queue: Arc<RequestQueue>,
        aggregator: Arc<EventAggregator>,
        delivery: Arc<DeliveryEngine>,
        metrics: SharedMetrics,
        interval: Duration,
    ) -> Arc<Self> {
        let manual = builder.config().manual_session_handling;
        Arc::new(Self {
            builder,
            queue,
            aggregator,
            delivery,
            metrics,
            interval,
            manual,
            state: Mutex::new(SessionState::default()),
            task: Mutex::new(None),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_session_initiated(&self) -> bool {
        self.state().initiated
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    pub fn is_manual(&self) -> bool {
        self.manual
    }

    fn metrics_param(&self) -> SessionResult<(String, String)> {
        Ok((
            "metrics".to_string(),
            serde_json::to_string(&self.metrics.metrics())?,
        ))
    }

    /// Whole seconds since the last session request; resets the mark.
    fn take_elapsed(&self, state: &mut SessionState) -> i64 {
        let now = self.builder.timestamper().now();
        let elapsed = state
            .last_request_at
            .map(|last| (now - last).num_seconds().max(0))
            .unwrap_or(0);
        state.last_request_at = Some(now);
        elapsed
    }

    /// Start a session and, unless sessions are manual, the timer.
    pub async fn begin_session(self: &Arc<Self>) -> SessionResult<Request> {
        let params: Params = vec![
            ("begin_session".to_string(), "1".to_string()),
            self.metrics_param()?,
        ];

        {
            let mut state = self.state();
            if state.initiated {
                return Err(SessionError::AlreadyStarted);
            }
            state.initiated = true;
            state.last_request_at = Some(self.builder.timestamper().now());
        }

        let request = self.queue.enqueue(self.builder.build(params)).await;
        info!(request_id = request.id, "Session started");

        if !self.manual {
            self.start();
        }
        Ok(request)
    }

    /// Report the time since the last session request.
    pub async fn extend_session(&self) -> SessionResult<Request> {
        let duration = {
            let mut state = self.state();
            if !state.initiated {
                return Err(SessionError::NotStarted);
            }
            self.take_elapsed(&mut state)
        };

        let payload = self
            .builder
            .build(vec![("session_duration".to_string(), duration.to_string())]);
        let request = self.queue.enqueue(payload).await;
        debug!(request_id = request.id, duration, "Session extended");
        Ok(request)
    }

    /// End the session. `dispose_timer` also stops the timer task, waiting
    /// for a tick in progress to finish; otherwise the task stays idle until
    /// the next session begins.
    pub async fn end_session(&self, dispose_timer: bool) -> SessionResult<Request> {
        let duration = {
            let mut state = self.state();
            if !state.initiated {
                return Err(SessionError::NotStarted);
            }
            let duration = self.take_elapsed(&mut state);
            state.initiated = false;
            duration
        };

        let params: Params = vec![
            ("end_session".to_string(), "1".to_string()),
            ("session_duration".to_string(), duration.to_string()),
            self.metrics_param()?,
        ];
        let request = self.queue.enqueue(self.builder.build(params)).await;
        info!(request_id = request.id, duration, "Session ended");

        if dispose_timer {
            self.stop().await;
        }
        Ok(request)
    }

    /// One timer tick: flush events, extend, drain.
    pub async fn tick(&self) -> SessionResult<TickReport> {
        if !self.is_session_initiated() {
            return Ok(TickReport {
                idle: true,
                ..TickReport::default()
            });
        }

        let flushed = self.aggregator.flush_all().await?.len();
        let extended = match self.extend_session().await {
            Ok(request) => Some(request.id),
            // Session ended between the check and the extend.
            Err(SessionError::NotStarted) => None,
            Err(e) => return Err(e),
        };
        let drain = self.delivery.process_queue().await;

        Ok(TickReport {
            idle: false,
            flushed,
            extended,
            drain,
        })
    }

    /// Spawn the timer task if it is not already running.
    pub fn start(self: &Arc<Self>) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        let (stop, mut stopped) = watch::channel(false);
        let period = self.interval;

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    // Only checked between ticks, so a drain pass always
                    // runs to completion.
                    biased;
                    _ = stopped.changed() => break,
                    _ = ticker.tick() => {
                        let Some(timer) = weak.upgrade() else { break };
                        if let Err(e) = timer.tick().await {
                            warn!(error = %e, "Session tick failed");
                        }
                    }
                }
            }
            debug!("Session timer stopped");
        });

        *task = Some(TimerTask { handle, stop });
        info!(interval_secs = period.as_secs_f64(), "Session timer started");
    }

    /// Stop the timer task and wait for it to exit. A tick in progress
    /// finishes first. Safe to call when the timer is not running.
    pub async fn stop(&self) {
        let task = self.task.lock().unwrap_or_else(|e| e.into_inner()).take();
        let Some(TimerTask { handle, stop }) = task else {
            return;
        };

        let _ = stop.send(true);
        if let Err(e) = handle.await {
            warn!(error = %e, "Session timer task failed");
        }
        debug!("Session timer disposed");
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        // The task only holds a strong reference while ticking, so it is
        // idle here.
        if let Some(task) = self.task.get_mut().ok().and_then(Option::take) {
            task.handle.abort();
        }
    }
}

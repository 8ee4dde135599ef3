//! The SDK context.
//!
//! A [`Beacon`] owns every component (record stores, request queue, event
//! aggregator, delivery engine, session timer). Hosts build one with
//! [`Beacon::builder`] and pass it around; nothing is process-global, so
//! tests can run any number of isolated instances side by side.

use crate::crash::Breadcrumbs;
use crate::profile::CustomProperties;
use crate::views::ViewTracker;
use crate::{validation, SdkResult};
use beacon_config_and_utils::{
    Config, Paths, SharedClock, SharedMetrics, StaticMetrics, SystemClock, Timestamper,
};
use beacon_database::{Database, EventClass, EventStore, RequestStore, Settings};
use beacon_events::{EventAggregator, NewEvent};
use beacon_outbox::{
    DeliveryEngine, DrainReport, HttpTransport, Params, Request, RequestBuilder, RequestQueue,
    Transport,
};
use beacon_session::{SessionTimer, TickReport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEVICE_ID_KEY: &str = "device_id";
const FIRST_LAUNCH_KEY: &str = "first_launch_done";

/// Snapshot of SDK state for hosts and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub device_id: String,
    pub queued_requests: usize,
    pub pending_views: usize,
    pub pending_events: usize,
    pub session_active: bool,
    pub first_launch: bool,
}

/// Assembles a [`Beacon`]. Anything not provided gets the production default.
pub struct BeaconBuilder {
    config: Config,
    database: Option<Arc<Database>>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<SharedClock>,
    metrics: Option<SharedMetrics>,
}

impl BeaconBuilder {
    pub fn database(mut self, database: Arc<Database>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn metrics(mut self, metrics: SharedMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the config, restore persisted state, and begin the first
    /// session unless sessions are manual.
    pub async fn start(self) -> SdkResult<Beacon> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let db = match self.database {
            Some(db) => db,
            None => Arc::new(Database::open(&Paths::new()?.database_file())?),
        };
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(config.request_timeout_secs)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(StaticMetrics::from_env("unknown")));

        let settings = Settings::new(db.clone());
        let device_id = resolve_device_id(&config, &settings);
        let first_launch = settings.get(FIRST_LAUNCH_KEY).is_none();
        if first_launch {
            settings.set(FIRST_LAUNCH_KEY, "1");
        }

        let timestamper = Arc::new(Timestamper::new(clock.clone()));
        let builder = Arc::new(RequestBuilder::new(
            config.clone(),
            timestamper,
            device_id.clone(),
        ));
        let queue = Arc::new(RequestQueue::new(
            Arc::new(RequestStore::new(db.clone())),
            clock.clone(),
            config.stored_request_limit,
        ));
        let aggregator = Arc::new(EventAggregator::new(
            EventStore::new(db.clone(), EventClass::View),
            EventStore::new(db, EventClass::NonView),
            builder.clone(),
            queue.clone(),
        ));
        let delivery = Arc::new(DeliveryEngine::new(
            queue.clone(),
            transport.clone(),
            config.input_url(),
            config.delivery_max_attempts,
        ));
        let session = SessionTimer::new(
            builder.clone(),
            queue.clone(),
            aggregator.clone(),
            delivery.clone(),
            metrics.clone(),
            Duration::from_secs(config.session_duration_secs),
        );

        let restored = queue.initialize().await;
        let (views, others) = aggregator.initialize().await;

        let beacon = Beacon {
            breadcrumbs: Breadcrumbs::new(config.total_breadcrumbs_allowed),
            views: ViewTracker::default(),
            custom_properties: CustomProperties::default(),
            config,
            clock,
            metrics,
            settings,
            transport,
            builder,
            queue,
            aggregator,
            delivery,
            session,
            first_launch,
        };

        info!(
            device_id = %device_id,
            first_launch,
            restored_requests = restored,
            restored_views = views,
            restored_events = others,
            "Beacon started"
        );

        if !beacon.config.manual_session_handling && !beacon.config.enable_test_mode {
            beacon.session.begin_session().await?;
        }
        Ok(beacon)
    }
}

fn resolve_device_id(config: &Config, settings: &Settings) -> String {
    if let Some(id) = config.device_id.as_deref().filter(|id| !id.trim().is_empty()) {
        settings.set(DEVICE_ID_KEY, id);
        return id.to_string();
    }
    if let Some(id) = settings.get(DEVICE_ID_KEY) {
        return id;
    }
    let id = uuid::Uuid::new_v4().to_string();
    settings.set(DEVICE_ID_KEY, &id);
    debug!(device_id = %id, "Generated device id");
    id
}

/// Caller-owned SDK instance.
pub struct Beacon {
    pub(crate) config: Arc<Config>,
    pub(crate) clock: SharedClock,
    pub(crate) metrics: SharedMetrics,
    pub(crate) settings: Settings,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) builder: Arc<RequestBuilder>,
    pub(crate) queue: Arc<RequestQueue>,
    pub(crate) aggregator: Arc<EventAggregator>,
    pub(crate) delivery: Arc<DeliveryEngine>,
    pub(crate) session: Arc<SessionTimer>,
    pub(crate) views: ViewTracker,
    pub(crate) breadcrumbs: Breadcrumbs,
    pub(crate) custom_properties: CustomProperties,
    first_launch: bool,
}

impl Beacon {
    pub fn builder(config: Config) -> BeaconBuilder {
        BeaconBuilder {
            config,
            database: None,
            transport: None,
            clock: None,
            metrics: None,
        }
    }

    /// Production setup: database under `paths`, HTTP transport, wall clock.
    pub async fn open(config: Config, paths: &Paths) -> SdkResult<Self> {
        paths.ensure_dirs()?;
        let db = Arc::new(Database::open(&paths.database_file())?);
        Self::builder(config).database(db).start().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn device_id(&self) -> String {
        self.builder.device_id()
    }

    pub fn is_first_launch(&self) -> bool {
        self.first_launch
    }

    pub fn queue(&self) -> &Arc<RequestQueue> {
        &self.queue
    }

    pub fn aggregator(&self) -> &Arc<EventAggregator> {
        &self.aggregator
    }

    pub fn session(&self) -> &Arc<SessionTimer> {
        &self.session
    }

    pub(crate) fn test_mode(&self) -> bool {
        if self.config.enable_test_mode {
            debug!("Test mode, nothing recorded");
        }
        self.config.enable_test_mode
    }

    /// Enqueue a request built from `params` directly, bypassing the
    /// event buffers.
    pub(crate) async fn enqueue(&self, params: Params) -> Request {
        self.queue.enqueue(self.builder.build(params)).await
    }

    // ==========================================
    // Events
    // ==========================================

    /// Record a custom event.
    pub async fn record_event(&self, event: NewEvent) -> SdkResult<()> {
        event.validate()?;
        if self.test_mode() {
            return Ok(());
        }
        self.aggregator.record_event(event).await?;
        Ok(())
    }

    // ==========================================
    // Sessions
    // ==========================================

    pub async fn begin_session(&self) -> SdkResult<()> {
        if self.test_mode() {
            return Ok(());
        }
        self.session.begin_session().await?;
        Ok(())
    }

    pub async fn extend_session(&self) -> SdkResult<()> {
        if self.test_mode() {
            return Ok(());
        }
        self.session.extend_session().await?;
        Ok(())
    }

    pub async fn end_session(&self) -> SdkResult<()> {
        if self.test_mode() {
            return Ok(());
        }
        self.session.end_session(false).await?;
        Ok(())
    }

    /// Run one session-timer tick by hand.
    pub async fn tick(&self) -> SdkResult<TickReport> {
        Ok(self.session.tick().await?)
    }

    // ==========================================
    // Delivery
    // ==========================================

    /// Flush both event buffers, then run a drain pass.
    pub async fn flush(&self) -> SdkResult<DrainReport> {
        self.aggregator.flush_all().await?;
        Ok(self.delivery.process_queue().await)
    }

    /// Host went to the background.
    pub async fn on_pause(&self) -> SdkResult<DrainReport> {
        debug!("Host paused");
        self.flush().await
    }

    /// Host lost focus.
    pub async fn on_focus_lost(&self) -> SdkResult<DrainReport> {
        debug!("Host lost focus");
        self.flush().await
    }

    /// End the automatic session, send what can be sent, stop the timer.
    pub async fn shutdown(&self) -> SdkResult<DrainReport> {
        if !self.config.manual_session_handling && self.session.is_session_initiated() {
            self.session.end_session(true).await?;
        }
        self.session.stop().await;
        let report = self.flush().await?;
        info!(
            delivered = report.delivered,
            left = self.queue.count().await,
            "Beacon shut down"
        );
        Ok(report)
    }

    /// Drop queued requests and buffered events.
    pub async fn clear(&self) {
        self.queue.clear().await;
        self.aggregator.clear().await;
    }

    pub async fn status(&self) -> Status {
        let (pending_views, pending_events) = self.aggregator.pending().await;
        Status {
            device_id: self.device_id(),
            queued_requests: self.queue.count().await,
            pending_views,
            pending_events,
            session_active: self.session.is_session_initiated(),
            first_launch: self.first_launch,
        }
    }

    // ==========================================
    // Device id
    // ==========================================

    /// Switch to a new device id.
    ///
    /// With `merge`, the server is asked to merge the old id's data into the
    /// new one. Without it, the current session ends under the old id and a
    /// new one begins under the new id.
    pub async fn change_device_id(&self, device_id: &str, merge: bool) -> SdkResult<()> {
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(validation("device id must not be empty"));
        }
        let old = self.device_id();
        if old == device_id || self.test_mode() {
            return Ok(());
        }

        if merge {
            self.builder.set_device_id(device_id);
            self.settings.set(DEVICE_ID_KEY, device_id);
            self.enqueue(vec![("old_device_id".to_string(), old.clone())])
                .await;
        } else {
            self.aggregator.flush_all().await?;
            let had_session = self.session.is_session_initiated();
            if had_session {
                self.session.end_session(false).await?;
            }
            self.builder.set_device_id(device_id);
            self.settings.set(DEVICE_ID_KEY, device_id);
            if had_session {
                self.session.begin_session().await?;
            }
        }

        info!(old = %old, new = %device_id, merge, "Device id changed");
        Ok(())
    }
}

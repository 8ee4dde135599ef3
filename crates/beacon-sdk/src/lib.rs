//! Beacon analytics SDK.
//!
//! Build a [`Beacon`] with [`Beacon::builder`] (or [`Beacon::open`] for the
//! production defaults), then record events, views, crashes, and profile
//! data through it. Requests are persisted before delivery and survive
//! restarts.

mod context;
mod crash;
mod error;
mod location;
mod profile;
mod push;
mod rating;
mod remote_config;
mod views;

#[cfg(test)]
mod test_support;
#[cfg(test)]
mod tests;

pub use context::{Beacon, BeaconBuilder, Status};
pub use crash::{LogLevel, MAX_BREADCRUMB_CHARS};
pub use error::{SdkError, SdkResult};
pub use location::Location;
pub use profile::{is_picture_valid, UserDetails};
pub use push::{PushMode, PushPlatform};
pub use remote_config::RemoteConfig;

pub(crate) use error::validation;

pub use beacon_config_and_utils::{
    init_logging, Clock, Config, ManualClock, MetricsProvider, Paths, SharedClock, SharedMetrics,
    StaticMetrics, SystemClock,
};
pub use beacon_database::{Database, EventClass};
pub use beacon_events::{keys, Event, NewEvent, SegmentValue, Segmentation};
pub use beacon_outbox::{
    DeliveryError, DrainReport, Request, RequestPayload, Transport, TransportResponse,
};
pub use beacon_session::TickReport;

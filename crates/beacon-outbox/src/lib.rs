//! Outbound request pipeline.
//!
//! This crate provides:
//! - RequestBuilder: base parameters, GET/POST selection, `checksum256`
//! - RequestQueue: bounded FIFO backed by the durable request store
//! - Transport: async GET/POST contract plus the reqwest implementation
//! - DeliveryEngine: snapshot drain with a bounded number of attempts per request

mod builder;
mod delivery;
mod error;
mod queue;
mod request;
mod transport;

pub use builder::{checksum256, Params, RequestBuilder};
pub use delivery::{DeliveryEngine, DrainReport};
pub use error::{DeliveryError, OutboxError, OutboxResult};
pub use queue::RequestQueue;
pub use request::{Request, RequestPayload};
pub use transport::{HttpTransport, Transport, TransportResponse};

//! SQLite persistence for the beacon SDK.
//!
//! This crate provides:
//! - Schema migrations tracked in the `migrations` table
//! - `Database`: a single connection with typed query methods
//! - `RequestStore` / `EventStore`: the durable record stores used by the
//!   request queue and event aggregator. They never return errors; storage
//!   failures are logged and turned into safe defaults.
//! - `Settings`: small key/value table for device id and first-launch state

mod db;
mod error;
mod migrations;
mod models;
mod store;

pub use db::Database;
pub use error::{DatabaseError, DatabaseResult};
pub use migrations::{run_migrations, CURRENT_VERSION};
pub use models::*;
pub use store::{EventStore, RecordStore, RequestStore, Settings};

//! End-to-end scenarios over a full [`crate::Beacon`].
//!
//! - `offline.rs`     - delivery while the collector is unreachable, then back
//! - `persistence.rs` - queued requests and buffered events across restarts
//! - `device_id.rs`   - device id resolution, change, first-launch flag
//! - `lifecycle.rs`   - pause, focus loss, and shutdown hooks
//! - `test_mode.rs`   - calls succeed without producing requests

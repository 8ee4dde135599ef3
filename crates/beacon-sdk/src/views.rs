//! View tracking and action reporting.

use crate::{validation, Beacon, SdkResult};
use beacon_events::{keys, NewEvent, Segmentation};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

/// Open time per view name.
#[derive(Debug, Default)]
pub(crate) struct ViewTracker {
    opened: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ViewTracker {
    fn open(&self, name: &str, at: DateTime<Utc>) {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), at);
    }

    fn close(&self, name: &str) -> Option<DateTime<Utc>> {
        self.opened
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name)
    }
}

fn view_segmentation(name: &str) -> Segmentation {
    Segmentation::new()
        .with("name", name)
        .with("segment", std::env::consts::OS)
}

impl Beacon {
    /// Record that a view was opened.
    pub async fn open_view(&self, name: &str, first_view: bool) -> SdkResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(validation("view name must not be empty"));
        }
        if self.test_mode() {
            return Ok(());
        }

        self.views.open(name, self.clock.now());

        let mut segmentation = view_segmentation(name)
            .with("visit", 1)
            .with("exit", 0)
            .with("bounce", 0);
        if first_view {
            segmentation.insert("start", 1);
        }
        debug!(view = name, first_view, "View opened");
        self.aggregator
            .record_event(NewEvent::new(keys::VIEW).segmentation(segmentation))
            .await?;
        Ok(())
    }

    /// Record that a view was closed. Duration is reported when the view
    /// was opened through this instance.
    pub async fn close_view(&self, name: &str) -> SdkResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(validation("view name must not be empty"));
        }
        if self.test_mode() {
            return Ok(());
        }

        let segmentation = view_segmentation(name).with("visit", 0).with("exit", 1);
        let mut event = NewEvent::new(keys::VIEW).segmentation(segmentation);
        if let Some(opened) = self.views.close(name) {
            let secs = (self.clock.now() - opened).num_milliseconds().max(0) as f64 / 1000.0;
            event = event.duration(secs);
        }
        debug!(view = name, "View closed");
        self.aggregator.record_event(event).await?;
        Ok(())
    }

    /// Record a UI action (click, scroll) at a position within a view.
    pub async fn report_action(
        &self,
        action_type: &str,
        x: i64,
        y: i64,
        width: i64,
        height: i64,
    ) -> SdkResult<()> {
        if action_type.trim().is_empty() {
            return Err(validation("action type must not be empty"));
        }
        if self.test_mode() {
            return Ok(());
        }

        let segmentation = Segmentation::new()
            .with("type", action_type)
            .with("x", x)
            .with("y", y)
            .with("width", width)
            .with("height", height);
        self.aggregator
            .record_event(NewEvent::new(keys::ACTION).segmentation(segmentation))
            .await?;
        Ok(())
    }
}

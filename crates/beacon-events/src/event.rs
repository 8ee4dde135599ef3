//! Event model.

use crate::{EventError, EventResult, Segmentation};
use beacon_config_and_utils::TimeMetrics;
use beacon_database::EventClass;
use serde::{Deserialize, Serialize};

/// Reserved event keys.
pub mod keys {
    pub const VIEW: &str = "[CLY]_view";
    pub const ACTION: &str = "[CLY]_action";
    pub const STAR_RATING: &str = "[CLY]_star_rating";
    pub const NPS: &str = "[CLY]_nps";
    pub const SURVEY: &str = "[CLY]_survey";
    pub const PUSH_ACTION: &str = "[CLY]_push_action";
    pub const ORIENTATION: &str = "[CLY]_orientation";

    pub const RESERVED: [&str; 7] = [
        VIEW,
        ACTION,
        STAR_RATING,
        NPS,
        SURVEY,
        PUSH_ACTION,
        ORIENTATION,
    ];

    pub fn is_reserved(key: &str) -> bool {
        RESERVED.contains(&key)
    }
}

/// An event as recorded by the host, before it is timestamped.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub key: String,
    pub count: i64,
    pub sum: Option<f64>,
    pub duration: Option<f64>,
    pub segmentation: Segmentation,
}

impl NewEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            count: 1,
            sum: None,
            duration: None,
            segmentation: Segmentation::new(),
        }
    }

    pub fn count(mut self, count: i64) -> Self {
        self.count = count;
        self
    }

    pub fn sum(mut self, sum: f64) -> Self {
        self.sum = Some(sum);
        self
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn segmentation(mut self, segmentation: Segmentation) -> Self {
        self.segmentation = segmentation;
        self
    }

    pub fn validate(&self) -> EventResult<()> {
        if self.key.trim().is_empty() {
            return Err(EventError::EmptyKey);
        }
        for (field, value) in [("sum", self.sum), ("dur", self.duration)] {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(EventError::NonFinite(field.to_string()));
            }
        }
        if let Some((key, _)) = self.segmentation.iter().find(|(_, v)| !v.is_finite()) {
            return Err(EventError::NonFinite(key.to_string()));
        }
        Ok(())
    }

    /// Attach time fields. Validates the key first.
    pub fn stamp(self, time: TimeMetrics) -> EventResult<Event> {
        self.validate()?;
        Ok(Event {
            key: self.key,
            count: self.count,
            sum: self.sum,
            duration: self.duration,
            segmentation: self.segmentation,
            timestamp: time.timestamp,
            hour: time.hour,
            dow: time.dow,
            tz: time.tz,
        })
    }
}

/// A recorded analytics occurrence, in wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub key: String,
    pub count: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
    #[serde(rename = "dur", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Segmentation::is_empty")]
    pub segmentation: Segmentation,
    pub timestamp: i64,
    pub hour: u32,
    pub dow: u32,
    pub tz: i32,
}

impl Event {
    pub fn class(&self) -> EventClass {
        if self.key == keys::VIEW {
            EventClass::View
        } else {
            EventClass::NonView
        }
    }
}

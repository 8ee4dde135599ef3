//! Crash reports and breadcrumbs.

use crate::{validation, Beacon, SdkResult};
use beacon_events::Segmentation;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Longest breadcrumb kept, in characters.
pub const MAX_BREADCRUMB_CHARS: usize = 1000;

/// Severity passed to [`Beacon::log_callback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Log,
    Warning,
    Assert,
    Error,
    Exception,
}

impl LogLevel {
    fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::Exception)
    }
}

/// Bounded ring of recent log lines attached to crash reports.
#[derive(Debug)]
pub(crate) struct Breadcrumbs {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl Breadcrumbs {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        let line: String = line.chars().take(MAX_BREADCRUMB_CHARS).collect();
        let mut lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    fn joined(&self) -> String {
        let lines = self.lines.lock().unwrap_or_else(|e| e.into_inner());
        lines.iter().map(String::as_str).collect::<Vec<_>>().join("\n")
    }
}

impl Beacon {
    /// Remember a line to send along with the next crash report.
    pub fn add_breadcrumb(&self, line: &str) {
        self.breadcrumbs.push(line);
    }

    /// Send a crash report immediately (not through the event buffers).
    pub async fn send_crash_report(
        &self,
        message: &str,
        stack_trace: &str,
        segments: Option<Segmentation>,
        nonfatal: bool,
    ) -> SdkResult<()> {
        if message.trim().is_empty() {
            return Err(validation("crash message must not be empty"));
        }
        if self.test_mode() {
            return Ok(());
        }

        let mut crash = Map::new();
        for (key, value) in self.metrics.metrics() {
            crash.insert(key, Value::String(value));
        }
        crash.insert("_name".to_string(), Value::String(message.to_string()));
        crash.insert("_error".to_string(), Value::String(stack_trace.to_string()));
        crash.insert("_nonfatal".to_string(), Value::Bool(nonfatal));
        crash.insert("_logs".to_string(), Value::String(self.breadcrumbs.joined()));
        if let Some(segments) = segments.filter(|s| !s.is_empty()) {
            crash.insert("_custom".to_string(), serde_json::to_value(&segments)?);
        }

        let request = self
            .enqueue(vec![(
                "crash".to_string(),
                Value::Object(crash).to_string(),
            )])
            .await;
        debug!(request_id = request.id, nonfatal, "Crash report queued");
        Ok(())
    }

    /// Feed host log output. Every line becomes a breadcrumb; errors are
    /// reported as non-fatal crashes when automatic reporting is on.
    pub async fn log_callback(
        &self,
        message: &str,
        stack_trace: &str,
        level: LogLevel,
    ) -> SdkResult<()> {
        self.add_breadcrumb(message);
        if level.is_error() && self.config.enable_automatic_crash_reporting {
            self.send_crash_report(message, stack_trace, None, true).await?;
        }
        Ok(())
    }
}

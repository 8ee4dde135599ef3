//! Subcommand implementations.

use beacon_config_and_utils::{Config, Paths};
use beacon_sdk::{Beacon, NewEvent, SegmentValue, Segmentation};
use std::error::Error;
use std::time::Duration;
use tracing::info;

type CliResult = Result<(), Box<dyn Error>>;

/// Parse a `key=value` segmentation argument.
pub fn parse_segment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

pub fn init(paths: &Paths, server_url: &str, app_key: &str) -> CliResult {
    let config = Config::new(server_url, app_key);
    config.validate()?;
    paths.ensure_dirs()?;
    config.save(paths)?;
    println!("Wrote {}", paths.config_file().display());
    Ok(())
}

pub async fn event(
    beacon: &Beacon,
    key: String,
    count: i64,
    sum: Option<f64>,
    duration: Option<f64>,
    segments: Vec<(String, String)>,
) -> CliResult {
    let segmentation: Segmentation = segments
        .into_iter()
        .map(|(k, v)| (k, SegmentValue::parse_literal(&v)))
        .collect();

    let mut event = NewEvent::new(key).count(count).segmentation(segmentation);
    if let Some(sum) = sum {
        event = event.sum(sum);
    }
    if let Some(duration) = duration {
        event = event.duration(duration);
    }
    beacon.record_event(event).await?;
    Ok(())
}

/// Begin a session, keep it alive for `seconds`, then end it.
pub async fn session(beacon: &Beacon, seconds: u64, offline: bool) -> CliResult {
    let period = Duration::from_secs(beacon.config().session_duration_secs.max(1));
    let total = Duration::from_secs(seconds);

    beacon.begin_session().await?;
    info!(seconds, "Session running");

    let mut elapsed = Duration::ZERO;
    while elapsed + period <= total {
        tokio::time::sleep(period).await;
        elapsed += period;
        if offline {
            beacon.extend_session().await?;
        } else {
            beacon.tick().await?;
        }
    }
    tokio::time::sleep(total - elapsed).await;

    beacon.end_session().await?;
    if offline {
        beacon.aggregator().flush_all().await?;
        println!("Queued ({} requests waiting)", beacon.queue().count().await);
        Ok(())
    } else {
        flush(beacon).await
    }
}

pub async fn flush(beacon: &Beacon) -> CliResult {
    let report = beacon.flush().await?;
    println!(
        "Delivered {} of {} ({} failed, {} attempts)",
        report.delivered, report.snapshot, report.failed, report.attempts
    );
    Ok(())
}

pub async fn status(beacon: &Beacon) {
    let status = beacon.status().await;
    let json = serde_json::json!({
        "device_id": status.device_id,
        "queued_requests": status.queued_requests,
        "pending_views": status.pending_views,
        "pending_events": status.pending_events,
        "first_launch": status.first_launch,
        "server_url": beacon.config().server_url,
    });
    println!("{json:#}");
}

pub async fn remote_config(beacon: &Beacon, refresh: bool) -> CliResult {
    let config = if refresh {
        beacon.update_remote_config().await?
    } else {
        beacon.remote_config().unwrap_or_default()
    };
    println!("{:#}", serde_json::Value::Object(config));
    Ok(())
}

//! Database migrations.
//!
//! Migrations are run in order and tracked in the `migrations` table.

use crate::{DatabaseError, DatabaseResult};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations.
pub fn run_migrations(conn: &Connection) -> DatabaseResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version > CURRENT_VERSION {
        return Err(DatabaseError::Migration(format!(
            "schema version {current_version} is newer than supported version {CURRENT_VERSION}"
        )));
    }
    if current_version == CURRENT_VERSION {
        debug!(current_version, "Schema up to date");
        return Ok(());
    }

    info!(current_version, target_version = CURRENT_VERSION, "Running migrations");

    if current_version < 1 {
        migrate_v1_record_store(conn)?;
    }
    if current_version < 2 {
        migrate_v2_settings(conn)?;
    }

    info!("Migrations complete");
    Ok(())
}

fn record_migration(conn: &Connection, version: i32, name: &str) -> DatabaseResult<()> {
    conn.execute(
        "INSERT INTO migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![version, name],
    )?;
    debug!(version, name, "Migration applied");
    Ok(())
}

/// V1: requests, buffered events with their segmentation, id sequences.
fn migrate_v1_record_store(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v1: record store");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS requests (
            id INTEGER PRIMARY KEY,
            is_get INTEGER NOT NULL,
            url TEXT,
            body TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY,
            class TEXT NOT NULL CHECK (class IN ('view', 'non_view')),
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_events_class
            ON events(class, id);

        CREATE TABLE IF NOT EXISTS event_segments (
            event_id INTEGER PRIMARY KEY REFERENCES events(id) ON DELETE CASCADE,
            payload TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS id_sequences (
            name TEXT PRIMARY KEY,
            last_id INTEGER NOT NULL
        );
        ",
    )?;

    record_migration(conn, 1, "record_store")?;
    Ok(())
}

/// V2: key/value settings (device id, first launch marker).
fn migrate_v2_settings(conn: &Connection) -> DatabaseResult<()> {
    info!("Applying migration v2: settings");

    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    record_migration(conn, 2, "settings")?;
    Ok(())
}

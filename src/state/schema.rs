//! Database schema definitions and migrations.

use rusqlite::Connection;

use super::error::StateError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Schema DDL for version 1.
///
/// `settings` is the upsert-replace key/value table shared with the login
/// tooling: one row per record type (`timestamp`, `cookie`, `screenshot`).
/// `sync_runs` keeps one row per sync invocation for reporting.
const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS settings (
    type TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at INTEGER NOT NULL,
    finished_at INTEGER,
    mode TEXT NOT NULL,
    windows_scanned INTEGER NOT NULL DEFAULT 0,
    events_seen INTEGER NOT NULL DEFAULT 0,
    attachments_uploaded INTEGER NOT NULL DEFAULT 0,
    annotations_degraded INTEGER NOT NULL DEFAULT 0,
    outcome TEXT,
    error TEXT
);

CREATE INDEX IF NOT EXISTS idx_sync_runs_started_at ON sync_runs(started_at);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StateError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// This function is idempotent and safe to call on both new and existing databases.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StateError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    if current_version == 0 {
        // Fresh database — apply full schema
        conn.execute_batch(SCHEMA_V1)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
        tracing::debug!("Initialized database schema at version {}", SCHEMA_VERSION);
    } else if current_version < SCHEMA_VERSION {
        // Run incremental migrations
        for version in (current_version + 1)..=SCHEMA_VERSION {
            migrate_to_version(conn, version)?;
        }
    }

    Ok(())
}

/// Apply migration for a specific version.
fn migrate_to_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    // Future migrations go here, e.g.:
    // match version {
    //     2 => { conn.execute_batch("ALTER TABLE sync_runs ADD COLUMN new_field TEXT")?; }
    //     _ => {}
    // }
    // For now, version 1 just applies the base schema
    if version != SCHEMA_VERSION {
        tracing::warn!(
            "Unexpected schema version {}, applying base schema",
            version
        );
    }
    conn.execute_batch(SCHEMA_V1)?;
    set_schema_version(conn, version)?;
    tracing::info!("Migrated database to schema version {}", version);
    Ok(())
}

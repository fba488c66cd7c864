//! State database trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, OptionalExtension};

use super::error::StateError;
use super::schema;
use super::types::{
    CheckpointState, RecordKind, RunOutcome, SyncMode, SyncRunRecord, SyncRunStats,
};

/// Trait for state database operations.
///
/// This trait is object-safe and can be used with `Arc<dyn StateDb>` for
/// shared access across async tasks.
#[async_trait]
pub trait StateDb: Send + Sync {
    /// Load the raw value of a settings record, if present.
    async fn load_record(&self, kind: RecordKind) -> Result<Option<String>, StateError>;

    /// Insert or replace a settings record.
    ///
    /// One row per record kind; a second write overwrites the first.
    async fn save_record(&self, kind: RecordKind, value: &str) -> Result<(), StateError>;

    /// Load the sync checkpoint.
    ///
    /// Returns `CheckpointState::Absent` when no checkpoint has been written
    /// yet; that is the signal that selects full-sync mode, not an error.
    async fn load_checkpoint(&self) -> Result<CheckpointState, StateError>;

    /// Persist the sync checkpoint, replacing any previous value.
    async fn save_checkpoint(&self, at: DateTime<Utc>) -> Result<(), StateError>;

    /// Record the start of a sync run and return its row ID.
    async fn begin_sync_run(
        &self,
        started_at: DateTime<Utc>,
        mode: SyncMode,
    ) -> Result<i64, StateError>;

    /// Complete a sync run with its outcome and counters.
    async fn finish_sync_run(
        &self,
        run_id: i64,
        outcome: RunOutcome,
        stats: &SyncRunStats,
        error: Option<&str>,
    ) -> Result<(), StateError>;

    /// Fetch the most recent sync runs, newest first.
    async fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRunRecord>, StateError>;
}

/// SQLite implementation of the state database.
pub struct SqliteStateDb {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqliteStateDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStateDb")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteStateDb {
    /// Open or create a database at the given path.
    pub async fn open(path: &Path) -> Result<Self, StateError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path_clone).map_err(|e| StateError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            // Enable WAL mode for better concurrent read/write performance
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StateError::Migration)?;

            // NORMAL synchronous mode is still safe with WAL
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StateError::Migration)?;

            // Run migrations
            schema::migrate(&conn)?;

            Ok::<_, StateError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory().map_err(|e| StateError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    /// Get the path to the database file.
    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StateDb for SqliteStateDb {
    async fn load_record(&self, kind: RecordKind) -> Result<Option<String>, StateError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))?;

        conn.query_row(
            "SELECT value FROM settings WHERE type = ?1",
            [kind.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(StateError::query)
    }

    async fn save_record(&self, kind: RecordKind, value: &str) -> Result<(), StateError> {
        let updated_at = Utc::now().timestamp();

        let conn = self
            .conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO settings (type, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(type) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![kind.as_str(), value, updated_at],
        )
        .map_err(StateError::query)?;

        Ok(())
    }

    async fn load_checkpoint(&self) -> Result<CheckpointState, StateError> {
        let raw = self.load_record(RecordKind::Timestamp).await?;

        match raw {
            None => Ok(CheckpointState::Absent),
            Some(value) => {
                let secs: i64 = value.parse().map_err(|_| StateError::Malformed {
                    kind: RecordKind::Timestamp.as_str(),
                    value: value.clone(),
                })?;
                let at = Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .ok_or(StateError::Malformed {
                        kind: RecordKind::Timestamp.as_str(),
                        value,
                    })?;
                Ok(CheckpointState::At(at))
            }
        }
    }

    async fn save_checkpoint(&self, at: DateTime<Utc>) -> Result<(), StateError> {
        self.save_record(RecordKind::Timestamp, &at.timestamp().to_string())
            .await
    }

    async fn begin_sync_run(
        &self,
        started_at: DateTime<Utc>,
        mode: SyncMode,
    ) -> Result<i64, StateError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))?;

        conn.execute(
            "INSERT INTO sync_runs (started_at, mode) VALUES (?1, ?2)",
            rusqlite::params![started_at.timestamp(), mode.as_str()],
        )
        .map_err(StateError::query)?;

        Ok(conn.last_insert_rowid())
    }

    async fn finish_sync_run(
        &self,
        run_id: i64,
        outcome: RunOutcome,
        stats: &SyncRunStats,
        error: Option<&str>,
    ) -> Result<(), StateError> {
        let finished_at = Utc::now().timestamp();

        let conn = self
            .conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))?;

        conn.execute(
            r#"
            UPDATE sync_runs SET
                finished_at = ?1,
                windows_scanned = ?2,
                events_seen = ?3,
                attachments_uploaded = ?4,
                annotations_degraded = ?5,
                outcome = ?6,
                error = ?7
            WHERE id = ?8
            "#,
            rusqlite::params![
                finished_at,
                stats.windows_scanned as i64,
                stats.events_seen as i64,
                stats.attachments_uploaded as i64,
                stats.annotations_degraded as i64,
                outcome.as_str(),
                error,
                run_id,
            ],
        )
        .map_err(StateError::query)?;

        Ok(())
    }

    async fn recent_sync_runs(&self, limit: u32) -> Result<Vec<SyncRunRecord>, StateError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT id, started_at, finished_at, mode, windows_scanned, events_seen, attachments_uploaded, annotations_degraded, outcome, error FROM sync_runs ORDER BY id DESC LIMIT ?1",
            )
            .map_err(StateError::query)?;

        let records = stmt
            .query_map([limit], |row| Ok(row_to_run_record(row)))
            .map_err(StateError::query)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(StateError::query)?;

        Ok(records)
    }
}

/// Convert a database row to a SyncRunRecord.
fn row_to_run_record(row: &rusqlite::Row<'_>) -> SyncRunRecord {
    let id: i64 = row.get(0).unwrap_or_default();
    let started_at_ts: i64 = row.get(1).unwrap_or(0);
    let finished_at_ts: Option<i64> = row.get(2).ok();
    let mode_str: String = row.get(3).unwrap_or_default();
    let windows_scanned: i64 = row.get(4).unwrap_or(0);
    let events_seen: i64 = row.get(5).unwrap_or(0);
    let attachments_uploaded: i64 = row.get(6).unwrap_or(0);
    let annotations_degraded: i64 = row.get(7).unwrap_or(0);
    let outcome_str: Option<String> = row.get(8).ok();
    let error: Option<String> = row.get(9).ok();

    SyncRunRecord {
        id,
        started_at: Utc
            .timestamp_opt(started_at_ts, 0)
            .single()
            .unwrap_or(DateTime::UNIX_EPOCH),
        finished_at: finished_at_ts.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
        mode: SyncMode::from_str(&mode_str).unwrap_or(SyncMode::Incremental),
        stats: SyncRunStats {
            windows_scanned: windows_scanned as u32,
            events_seen: events_seen as u64,
            attachments_uploaded: attachments_uploaded as u64,
            annotations_degraded: annotations_degraded as u64,
        },
        outcome: outcome_str.as_deref().and_then(RunOutcome::from_str),
        error,
    }
}

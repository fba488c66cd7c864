//! Types for the sync-state module.

use chrono::{DateTime, Utc};

/// Kind of a record in the `settings` table.
///
/// Mirrors the store layout shared with the login tooling: the checkpoint
/// lives under `timestamp`, cached session credentials under `cookie`, and
/// the login flow's debug screenshot under `screenshot`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RecordKind {
    Timestamp = 0,
    Cookie = 1,
    Screenshot = 2,
}

impl RecordKind {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timestamp => "timestamp",
            Self::Cookie => "cookie",
            Self::Screenshot => "screenshot",
        }
    }
}

/// Result of loading the checkpoint.
///
/// `Absent` is an expected state, not an error: it selects full-sync mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    /// No checkpoint has ever been written.
    Absent,
    /// Last persisted sync position.
    At(DateTime<Utc>),
}

/// Which kind of window walk a sync run performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Backward multi-window walk over fixed-length windows.
    Full,
    /// Single window from the checkpoint to now.
    Incremental,
}

impl SyncMode {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }

    /// Parse from the string stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal outcome of a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
}

impl RunOutcome {
    /// Convert to the string stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parse from the string stored in the database.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Counters accumulated over a single sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncRunStats {
    /// Number of windows fetched (including the terminating empty one).
    pub windows_scanned: u32,
    /// Number of events returned across all windows.
    pub events_seen: u64,
    /// Number of attachments uploaded to object storage.
    pub attachments_uploaded: u64,
    /// Number of images uploaded un-annotated after a metadata-embed failure.
    pub annotations_degraded: u64,
}

/// One row of the `sync_runs` history table.
#[derive(Debug, Clone)]
pub struct SyncRunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub mode: SyncMode,
    pub stats: SyncRunStats,
    pub outcome: Option<RunOutcome>,
    pub error: Option<String>,
}

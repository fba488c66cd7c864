//! Persistent sync state backed by SQLite.
//!
//! This module stores everything a run needs to pick up where the last one
//! left off:
//! - The sync checkpoint (newest event time fully processed)
//! - The cached session cookie and validation screenshot
//! - A history of sync runs with their counters and outcomes

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{SqliteStateDb, StateDb};
pub use error::StateError;
pub use types::{
    CheckpointState, RecordKind, RunOutcome, SyncMode, SyncRunRecord, SyncRunStats,
};

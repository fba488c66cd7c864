use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::pipeline::PipelineError;
use crate::state::StateError;
use crate::tadpoles::RemoteError;

/// Failure inside a single fetch window.
#[derive(Debug, Error)]
pub enum WindowError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// Custom error types for the sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error("Sync failed in window [{start}, {end}]: {source}")]
    WindowFailed {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        #[source]
        source: WindowError,
    },
}

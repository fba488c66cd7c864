use chrono::{DateTime, Duration, Utc};

use crate::state::SyncMode;

/// Upper bound on windows per run, in case the feed never drains.
pub const MAX_WINDOWS: u32 = 1000;

/// One fetch window, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Lazy producer of successive fetch windows.
///
/// Full mode walks backward through history: the first window ends at
/// "now", and each following window ends where the previous one started,
/// always spanning the same fixed length. Incremental mode yields the
/// single window from the checkpoint to now. The plan itself never looks
/// at fetch results; the sync loop stops consuming it once a window comes
/// back empty.
pub struct WindowPlan {
    mode: SyncMode,
    span: Duration,
    next_end: DateTime<Utc>,
    /// Start of the single incremental window; `None` once yielded.
    incremental_start: Option<DateTime<Utc>>,
    issued: u32,
}

impl WindowPlan {
    /// Backward multi-window walk ending at `now`.
    pub fn full(now: DateTime<Utc>, span: Duration) -> Self {
        Self {
            mode: SyncMode::Full,
            span,
            next_end: now,
            incremental_start: None,
            issued: 0,
        }
    }

    /// Single catch-up window `[checkpoint, now]`.
    ///
    /// A checkpoint from the future (clock skew, restored state) is
    /// clamped so the window never runs backward.
    pub fn incremental(checkpoint: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            mode: SyncMode::Incremental,
            span: Duration::zero(),
            next_end: now,
            incremental_start: Some(checkpoint.min(now)),
            issued: 0,
        }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }
}

impl Iterator for WindowPlan {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        match self.mode {
            SyncMode::Incremental => self.incremental_start.take().map(|start| Window {
                start,
                end: self.next_end,
            }),
            SyncMode::Full => {
                if self.issued >= MAX_WINDOWS {
                    return None;
                }
                let end = self.next_end;
                let start = end - self.span;
                self.next_end = start;
                self.issued += 1;
                Some(Window { start, end })
            }
        }
    }
}

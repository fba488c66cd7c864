//! The incremental sync loop.
//!
//! A run loads the checkpoint, plans its fetch windows (a single catch-up
//! window when a checkpoint exists, a backward walk through history when
//! none does), and drains each window through the attachment pipeline.
//! Checkpoint writes are pessimistic: each window's start is persisted
//! before its first fetch, so a crash mid-window costs at most a
//! re-processing of idempotent uploads, never a gap. Only a fully
//! successful run advances the checkpoint to the run's start time.

pub mod error;
pub mod window;

use std::io::IsTerminal;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use indicatif::{ProgressBar, ProgressStyle};

use crate::pipeline::AttachmentPipeline;
use crate::state::{CheckpointState, RunOutcome, StateDb, SyncMode, SyncRunStats};
use crate::storage::ObjectStore;
use crate::tadpoles::{EventsClient, PAGE_SIZE};

pub use error::{SyncError, WindowError};
pub use window::{Window, WindowPlan, MAX_WINDOWS};

/// Summary of one completed run.
#[derive(Debug, Clone, Copy)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub stats: SyncRunStats,
}

/// A window that failed, with the error that sank it.
struct WindowFailure {
    window: Window,
    error: WindowError,
}

/// Orchestrates checkpoint handling, window planning, and the pipeline.
pub struct SyncController {
    state: Arc<dyn StateDb>,
    client: Arc<EventsClient>,
    pipeline: AttachmentPipeline,
    span: Duration,
    no_progress_bar: bool,
}

impl SyncController {
    pub fn new(
        state: Arc<dyn StateDb>,
        client: Arc<EventsClient>,
        store: Arc<dyn ObjectStore>,
        span_days: u32,
        no_progress_bar: bool,
    ) -> Self {
        let pipeline = AttachmentPipeline::new(client.clone(), store);
        Self {
            state,
            client,
            pipeline,
            span: Duration::days(i64::from(span_days)),
            no_progress_bar,
        }
    }

    /// Run one sync against the current clock.
    pub async fn run(&self, force_full: bool) -> Result<SyncReport, SyncError> {
        self.run_at(Utc::now(), force_full).await
    }

    /// Run one sync as of `now`.
    ///
    /// The clock is a parameter so window arithmetic and checkpoint
    /// assertions are exact under test.
    pub async fn run_at(
        &self,
        now: DateTime<Utc>,
        force_full: bool,
    ) -> Result<SyncReport, SyncError> {
        let plan = match self.state.load_checkpoint().await? {
            CheckpointState::At(checkpoint) if !force_full => {
                tracing::info!(%checkpoint, "Resuming incremental sync");
                WindowPlan::incremental(checkpoint, now)
            }
            CheckpointState::Absent => {
                tracing::info!(
                    span_days = self.span.num_days(),
                    "No checkpoint found, starting full sync"
                );
                WindowPlan::full(now, self.span)
            }
            CheckpointState::At(_) => {
                tracing::info!(
                    span_days = self.span.num_days(),
                    "Full sync requested, ignoring checkpoint"
                );
                WindowPlan::full(now, self.span)
            }
        };
        let mode = plan.mode();

        let run_id = self.state.begin_sync_run(now, mode).await?;
        let mut stats = SyncRunStats::default();

        match self.walk(plan, &mut stats).await {
            Ok(()) => {
                // The whole history up to the run's start time is now mirrored.
                self.state.save_checkpoint(now).await?;
                self.state
                    .finish_sync_run(run_id, RunOutcome::Completed, &stats, None)
                    .await?;
                tracing::info!(
                    mode = %mode,
                    windows = stats.windows_scanned,
                    events = stats.events_seen,
                    uploaded = stats.attachments_uploaded,
                    degraded = stats.annotations_degraded,
                    "Sync completed"
                );
                Ok(SyncReport { mode, stats })
            }
            Err(failure) => {
                tracing::error!(
                    start = %failure.window.start,
                    end = %failure.window.end,
                    error = %failure.error,
                    "Sync failed, rolling checkpoint back to the window start"
                );
                self.state.save_checkpoint(failure.window.start).await?;
                let err = SyncError::WindowFailed {
                    start: failure.window.start,
                    end: failure.window.end,
                    source: failure.error,
                };
                self.state
                    .finish_sync_run(run_id, RunOutcome::Failed, &stats, Some(&err.to_string()))
                    .await?;
                Err(err)
            }
        }
    }

    /// Drain windows until one comes back empty or the plan runs out.
    async fn walk(
        &self,
        plan: WindowPlan,
        stats: &mut SyncRunStats,
    ) -> Result<(), WindowFailure> {
        let mode = plan.mode();

        for window in plan {
            // Assume failure before touching the network: if the process
            // dies inside this window, the next run resumes from its start.
            if let Err(e) = self.state.save_checkpoint(window.start).await {
                return Err(WindowFailure {
                    window,
                    error: e.into(),
                });
            }

            let events = match self.client.fetch_page(window.start, window.end).await {
                Ok(events) => events,
                Err(e) => {
                    return Err(WindowFailure {
                        window,
                        error: e.into(),
                    })
                }
            };
            stats.windows_scanned += 1;

            if events.is_empty() {
                tracing::debug!(start = %window.start, end = %window.end, "Window is empty, history is drained");
                return Ok(());
            }
            if events.len() as u32 == PAGE_SIZE {
                tracing::warn!(
                    start = %window.start,
                    end = %window.end,
                    "Window returned a full page; anything beyond the page cap stays invisible"
                );
            }

            let total_attachments: u64 = events
                .iter()
                .filter(|e| e.has_attachments())
                .map(|e| e.new_attachments.len() as u64)
                .sum();
            tracing::info!(
                start = %window.start,
                end = %window.end,
                events = events.len(),
                attachments = total_attachments,
                "Processing window"
            );
            let bar = create_progress_bar(self.no_progress_bar, total_attachments);

            for event in &events {
                stats.events_seen += 1;
                if !event.has_attachments() {
                    continue;
                }
                let event_time = event.event_time_utc();
                for attachment in &event.new_attachments {
                    match self.pipeline.process(attachment, event_time).await {
                        Ok(uploaded) => {
                            stats.attachments_uploaded += 1;
                            if uploaded.degraded {
                                stats.annotations_degraded += 1;
                            }
                            tracing::debug!(
                                path = %uploaded.path,
                                annotated = uploaded.annotated,
                                "Attachment mirrored"
                            );
                            bar.set_message(uploaded.path);
                            bar.inc(1);
                        }
                        Err(e) => {
                            bar.finish_and_clear();
                            return Err(WindowFailure {
                                window,
                                error: e.into(),
                            });
                        }
                    }
                }
            }
            bar.finish_and_clear();
        }

        if mode == SyncMode::Full {
            tracing::warn!(windows = MAX_WINDOWS, "Stopping the backward walk at the window guard");
        }
        Ok(())
    }
}

/// Returns `ProgressBar::hidden()` when progress is disabled or stdout is
/// not a TTY, keeping piped output and cron logs clean.
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("valid template")
            .progress_chars("=> "),
    );
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionCredentials;
    use crate::state::SqliteStateDb;
    use crate::storage::MemoryObjectStore;
    use chrono::TimeZone;
    use std::io::Cursor;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SPAN_DAYS: u32 = 45;
    const SPAN_SECS: i64 = 45 * 86_400;

    /// 2023-11-14 22:13:20 UTC
    const T0: i64 = 1_700_000_000;
    /// 2023-10-01 14:34:32 UTC, inside the first 45-day window before T0
    const EVENT_SECS: f64 = 1_696_170_872.52;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    struct Harness {
        server: MockServer,
        state: Arc<SqliteStateDb>,
        store: Arc<MemoryObjectStore>,
        controller: SyncController,
    }

    async fn harness() -> Harness {
        let server = MockServer::start().await;
        let state = Arc::new(SqliteStateDb::open_in_memory().unwrap());
        let store = Arc::new(MemoryObjectStore::new());

        let creds = SessionCredentials {
            uid: "parent@example.com".to_string(),
            cookie: "session=abc".to_string(),
        };
        let client =
            Arc::new(EventsClient::new(reqwest::Client::new(), server.uri(), &creds).unwrap());

        let state_db: Arc<dyn StateDb> = state.clone();
        let object_store: Arc<dyn ObjectStore> = store.clone();
        let controller = SyncController::new(state_db, client, object_store, SPAN_DAYS, true);

        Harness {
            server,
            state,
            store,
            controller,
        }
    }

    async fn mock_window(server: &MockServer, start: i64, end: i64, events: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/remote/v1/events"))
            .and(query_param("earliest_event_time", start.to_string()))
            .and(query_param("latest_event_time", end.to_string()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "events": events })),
            )
            .mount(server)
            .await;
    }

    async fn mock_window_failure(server: &MockServer, start: i64, end: i64, status: u16) {
        Mock::given(method("GET"))
            .and(path("/remote/v1/events"))
            .and(query_param("earliest_event_time", start.to_string()))
            .and(query_param("latest_event_time", end.to_string()))
            .respond_with(ResponseTemplate::new(status))
            .mount(server)
            .await;
    }

    async fn mock_attachment(server: &MockServer, key: &str, filename: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path("/remote/v1/attachment"))
            .and(query_param("key", key))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(
                        "Content-Disposition",
                        format!("attachment;filename={filename}").as_str(),
                    )
                    .set_body_bytes(body),
            )
            .mount(server)
            .await;
    }

    fn jpeg_fixture() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(5, 5, image::Rgb([0, 0, 255]));
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Jpeg)
            .unwrap();
        out
    }

    fn event_with_jpeg(key: &str) -> serde_json::Value {
        serde_json::json!({
            "event_time": EVENT_SECS,
            "attachments": ["obj1"],
            "new_attachments": [{"key": key, "mime_type": "image/jpeg"}]
        })
    }

    fn event_without_attachments() -> serde_json::Value {
        serde_json::json!({
            "event_time": EVENT_SECS,
            "attachments": [],
            "new_attachments": []
        })
    }

    #[tokio::test]
    async fn test_full_sync_end_to_end() {
        let h = harness().await;

        // First window has two events (one with a photo), second is empty.
        mock_window(
            &h.server,
            T0 - SPAN_SECS,
            T0,
            serde_json::json!([event_with_jpeg("k1"), event_without_attachments()]),
        )
        .await;
        mock_window(
            &h.server,
            T0 - 2 * SPAN_SECS,
            T0 - SPAN_SECS,
            serde_json::json!([]),
        )
        .await;
        mock_attachment(&h.server, "k1", "IMG_0042.jpg", jpeg_fixture()).await;

        let report = h.controller.run_at(at(T0), false).await.unwrap();

        assert_eq!(report.mode, SyncMode::Full);
        assert_eq!(report.stats.windows_scanned, 2);
        assert_eq!(report.stats.events_seen, 2);
        assert_eq!(report.stats.attachments_uploaded, 1);
        assert_eq!(report.stats.annotations_degraded, 0);

        // Exactly one object, at the path derived from the event's UTC time
        assert_eq!(h.store.paths(), vec!["2023/Oct/IMG_0042.jpg".to_string()]);
        let object = h.store.get("2023/Oct/IMG_0042.jpg").unwrap();
        assert_eq!(object.content_type, "image/jpeg");

        // The stored image carries the event time in US Eastern
        let exif = exif::Reader::new()
            .read_from_container(&mut Cursor::new(object.bytes.as_ref()))
            .unwrap();
        let dto = exif
            .get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY)
            .map(|f| f.display_value().to_string())
            .unwrap_or_default();
        assert!(dto.contains("10:34:32"), "unexpected DateTimeOriginal: {dto}");
        assert!(dto.contains("EDT"), "unexpected DateTimeOriginal: {dto}");

        // Post-run checkpoint equals the run's start time
        let checkpoint = h.state.load_checkpoint().await.unwrap();
        assert_eq!(checkpoint, CheckpointState::At(at(T0)));

        // The run is on record
        let runs = h.state.recent_sync_runs(10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].mode, SyncMode::Full);
        assert_eq!(runs[0].outcome, Some(RunOutcome::Completed));
        assert_eq!(runs[0].stats.attachments_uploaded, 1);
        assert!(runs[0].finished_at.is_some());
    }

    #[tokio::test]
    async fn test_incremental_sync_runs_exactly_one_window() {
        let h = harness().await;
        let checkpoint = at(T0 - 7 * 86_400);
        h.state.save_checkpoint(checkpoint).await.unwrap();

        // Only the [checkpoint, now] window is mocked; a second fetch would 404.
        mock_window(
            &h.server,
            checkpoint.timestamp(),
            T0,
            serde_json::json!([{
                "event_time": (T0 - 86_400) as f64,
                "attachments": ["a"],
                "new_attachments": [{"key": "kv", "mime_type": "video/mp4"}]
            }]),
        )
        .await;
        mock_attachment(&h.server, "kv", "clip.mp4", b"mp4bytes".to_vec()).await;

        let report = h.controller.run_at(at(T0), false).await.unwrap();

        assert_eq!(report.mode, SyncMode::Incremental);
        assert_eq!(report.stats.windows_scanned, 1);
        assert_eq!(report.stats.attachments_uploaded, 1);
        assert_eq!(
            h.state.load_checkpoint().await.unwrap(),
            CheckpointState::At(at(T0))
        );
        assert_eq!(h.store.paths(), vec!["2023/Nov/clip.mp4".to_string()]);
    }

    #[tokio::test]
    async fn test_incremental_sync_with_empty_window_completes() {
        let h = harness().await;
        let checkpoint = at(T0 - 3600);
        h.state.save_checkpoint(checkpoint).await.unwrap();

        mock_window(&h.server, checkpoint.timestamp(), T0, serde_json::json!([])).await;

        let report = h.controller.run_at(at(T0), false).await.unwrap();

        assert_eq!(report.stats.windows_scanned, 1);
        assert_eq!(report.stats.events_seen, 0);
        assert_eq!(
            h.state.load_checkpoint().await.unwrap(),
            CheckpointState::At(at(T0))
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_rolls_checkpoint_back_to_current_window_start() {
        let h = harness().await;

        // First window succeeds (non-empty), second fetch blows up.
        mock_window(
            &h.server,
            T0 - SPAN_SECS,
            T0,
            serde_json::json!([event_without_attachments()]),
        )
        .await;
        mock_window_failure(&h.server, T0 - 2 * SPAN_SECS, T0 - SPAN_SECS, 500).await;

        let err = h.controller.run_at(at(T0), false).await.unwrap_err();

        match err {
            SyncError::WindowFailed { start, end, .. } => {
                assert_eq!(start, at(T0 - 2 * SPAN_SECS));
                assert_eq!(end, at(T0 - SPAN_SECS));
            }
            other => panic!("unexpected error: {other}"),
        }

        // Checkpoint is the failed window's start, not the run's start time
        assert_eq!(
            h.state.load_checkpoint().await.unwrap(),
            CheckpointState::At(at(T0 - 2 * SPAN_SECS))
        );

        let runs = h.state.recent_sync_runs(1).await.unwrap();
        assert_eq!(runs[0].outcome, Some(RunOutcome::Failed));
        assert!(runs[0].error.as_deref().unwrap_or("").contains("window"));
        assert_eq!(runs[0].stats.windows_scanned, 1);
    }

    #[tokio::test]
    async fn test_attachment_failure_rolls_checkpoint_back() {
        let h = harness().await;

        mock_window(
            &h.server,
            T0 - SPAN_SECS,
            T0,
            serde_json::json!([event_with_jpeg("gone")]),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/remote/v1/attachment"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&h.server)
            .await;

        let err = h.controller.run_at(at(T0), false).await.unwrap_err();
        assert!(matches!(err, SyncError::WindowFailed { .. }));

        assert_eq!(
            h.state.load_checkpoint().await.unwrap(),
            CheckpointState::At(at(T0 - SPAN_SECS))
        );
        assert!(h.store.is_empty());
    }

    #[tokio::test]
    async fn test_full_page_is_not_treated_as_exhaustion() {
        let h = harness().await;

        let full_page: Vec<serde_json::Value> =
            (0..PAGE_SIZE).map(|_| event_without_attachments()).collect();
        mock_window(
            &h.server,
            T0 - SPAN_SECS,
            T0,
            serde_json::Value::Array(full_page),
        )
        .await;
        mock_window(
            &h.server,
            T0 - 2 * SPAN_SECS,
            T0 - SPAN_SECS,
            serde_json::json!([]),
        )
        .await;

        let report = h.controller.run_at(at(T0), false).await.unwrap();

        // The walk continued past the full page and only stopped on empty
        assert_eq!(report.stats.windows_scanned, 2);
        assert_eq!(report.stats.events_seen, u64::from(PAGE_SIZE));
    }

    #[tokio::test]
    async fn test_broken_image_degrades_but_run_completes() {
        let h = harness().await;

        mock_window(
            &h.server,
            T0 - SPAN_SECS,
            T0,
            serde_json::json!([event_with_jpeg("kbad")]),
        )
        .await;
        mock_window(
            &h.server,
            T0 - 2 * SPAN_SECS,
            T0 - SPAN_SECS,
            serde_json::json!([]),
        )
        .await;
        mock_attachment(&h.server, "kbad", "broken.jpg", b"not an image".to_vec()).await;

        let report = h.controller.run_at(at(T0), false).await.unwrap();

        assert_eq!(report.stats.attachments_uploaded, 1);
        assert_eq!(report.stats.annotations_degraded, 1);
        let object = h.store.get("2023/Oct/broken.jpg").unwrap();
        assert_eq!(object.bytes.as_ref(), b"not an image");
        assert_eq!(
            h.state.load_checkpoint().await.unwrap(),
            CheckpointState::At(at(T0))
        );
    }

    #[tokio::test]
    async fn test_force_full_ignores_existing_checkpoint() {
        let h = harness().await;
        h.state.save_checkpoint(at(T0 - 3600)).await.unwrap();

        // Only full-mode windows are mocked; an incremental fetch would 404.
        mock_window(&h.server, T0 - SPAN_SECS, T0, serde_json::json!([])).await;

        let report = h.controller.run_at(at(T0), true).await.unwrap();

        assert_eq!(report.mode, SyncMode::Full);
        assert_eq!(report.stats.windows_scanned, 1);
        assert_eq!(
            h.state.load_checkpoint().await.unwrap(),
            CheckpointState::At(at(T0))
        );
    }
}

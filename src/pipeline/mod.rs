//! Per-attachment download, annotate, upload pipeline.
//!
//! One attachment at a time: fetch the body from tadpoles, derive the
//! storage path from the event time and the server-declared filename,
//! embed capture metadata when the attachment is an image, and write the
//! result to the object store. Metadata problems degrade to storing the
//! original bytes; remote and storage problems propagate to the sync loop.

pub mod annotate;
pub mod error;

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::storage::ObjectStore;
use crate::tadpoles::{AttachmentRef, EventsClient};

pub use error::{EmbedError, PipelineError};

/// Derive the bucket-relative path for an attachment.
///
/// Objects are laid out `<year>/<month-abbrev>/<filename>` by the event's
/// UTC capture time. Only the final component of the server-declared
/// filename is used, so a hostile disposition header cannot point outside
/// the layout.
pub fn storage_path(event_time: DateTime<Utc>, filename: &str) -> String {
    let basename = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    format!(
        "{}/{}/{}",
        event_time.format("%Y"),
        event_time.format("%b"),
        basename
    )
}

/// What one [`AttachmentPipeline::process`] call stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    /// Bucket-relative path of the stored object.
    pub path: String,
    /// True when the stored bytes carry embedded capture metadata.
    pub annotated: bool,
    /// True when annotation was attempted but failed, so the original
    /// bytes were stored instead.
    pub degraded: bool,
}

/// Drives one attachment from download to durable storage.
pub struct AttachmentPipeline {
    client: Arc<EventsClient>,
    store: Arc<dyn ObjectStore>,
}

impl AttachmentPipeline {
    pub fn new(client: Arc<EventsClient>, store: Arc<dyn ObjectStore>) -> Self {
        Self { client, store }
    }

    /// Mirror one attachment into object storage.
    ///
    /// Images (`image/jpeg`, `image/png`) are re-encoded with capture
    /// metadata embedded; if that fails the original bytes are stored and
    /// the result is flagged degraded. Every other media type passes
    /// through untouched. The stored content type is always the declared
    /// source MIME type. Re-running for the same attachment overwrites the
    /// same path, so retries are safe.
    pub async fn process(
        &self,
        attachment: &AttachmentRef,
        event_time: DateTime<Utc>,
    ) -> Result<Uploaded, PipelineError> {
        let download = self.client.download_attachment(&attachment.key).await?;
        let path = storage_path(event_time, &download.filename);

        let is_image = matches!(
            attachment.mime_type.as_str(),
            "image/jpeg" | "image/png"
        );
        if !is_image {
            tracing::debug!(path, mime = attachment.mime_type, "Storing attachment unmodified");
            self.store
                .put(&path, &attachment.mime_type, download.bytes)
                .await?;
            return Ok(Uploaded {
                path,
                annotated: false,
                degraded: false,
            });
        }

        match annotate::annotate_image(&download.bytes, event_time) {
            Ok(jpeg) => {
                tracing::debug!(path, "Storing annotated image");
                self.store
                    .put(&path, &attachment.mime_type, Bytes::from(jpeg))
                    .await?;
                Ok(Uploaded {
                    path,
                    annotated: true,
                    degraded: false,
                })
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Metadata embed failed, storing original bytes");
                self.store
                    .put(&path, &attachment.mime_type, download.bytes)
                    .await?;
                Ok(Uploaded {
                    path,
                    annotated: false,
                    degraded: true,
                })
            }
        }
    }
}

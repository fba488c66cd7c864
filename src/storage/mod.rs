//! Object storage backends for mirrored attachments.
//!
//! Everything the pipeline uploads goes through [`ObjectStore`], keyed by a
//! bucket-relative path like `2023/Jul/IMG_0042.jpg`. Writes are replace
//! semantics all the way down: re-uploading a path converges on the newest
//! bytes rather than duplicating the object, which is what makes window
//! re-processing after a rollback safe.

pub mod error;
pub mod fs;
pub mod http;
#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;

pub use error::StorageError;
pub use fs::FsObjectStore;
pub use http::HttpObjectStore;
#[cfg(test)]
pub use memory::{MemoryObjectStore, StoredObject};

/// Write-only view of an object store.
///
/// This trait is object-safe and shared as `Arc<dyn ObjectStore>`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` at `path`, replacing any existing object there.
    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError>;
}

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::error::StorageError;
use super::ObjectStore;

/// Object store rooted at a local directory.
///
/// Objects land at `<root>/<path>`; parent directories are created on
/// demand. The content type is implied by the filename on disk, so it is
/// accepted and ignored here.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, _content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let dest = self.root.join(path);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Io {
                    path: path.to_string(),
                    source: e,
                })?;
        }

        let file_name = dest
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::Backend(format!("Invalid object path: {path}")))?;

        // Write to a .part file first so a crash never leaves a half-written
        // object at the final path.
        let part = dest.with_file_name(format!("{file_name}.part"));
        fs::write(&part, &bytes)
            .await
            .map_err(|e| StorageError::Io {
                path: path.to_string(),
                source: e,
            })?;
        fs::rename(&part, &dest)
            .await
            .map_err(|e| StorageError::Io {
                path: path.to_string(),
                source: e,
            })?;

        tracing::debug!(path, size = bytes.len(), "Stored object on disk");
        Ok(())
    }
}

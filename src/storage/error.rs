use thiserror::Error;

/// Custom error types for object storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write object {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object endpoint returned HTTP {status} for {path}")]
    Status { status: u16, path: String },

    #[error("Object upload failed for {path}: {source}")]
    Http {
        path: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

use thiserror::Error;

use crate::storage::StorageError;
use crate::tadpoles::RemoteError;

/// Failure while embedding capture metadata into an image.
///
/// Never fatal on its own: the pipeline falls back to storing the original
/// bytes and reports the degradation.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image {width}x{height} is too large to re-encode")]
    Oversize { width: u32, height: u32 },

    #[error("Failed to encode JPEG: {0}")]
    Encode(String),

    #[error("Failed to write EXIF block: {0}")]
    Metadata(String),
}

/// Failure while processing one attachment end to end.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

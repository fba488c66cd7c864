use thiserror::Error;

/// Custom error types for the tadpoles remote API.
///
/// An expired session shows up here as a redirect or auth status on an API
/// call; the sync loop treats that the same as any other remote failure and
/// leaves re-validation to the next run.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote API returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Redirect-to-login or auth status on an API call. Distinguished for
    /// log readers; callers handle it exactly like [`RemoteError::Status`].
    #[error("Session rejected with HTTP {status} for {url}, re-run with a fresh cookie")]
    InvalidSession { status: u16, url: String },

    #[error("Attachment response carries no usable Content-Disposition filename")]
    MissingDisposition,

    #[error("Credential value contains bytes not allowed in an HTTP header")]
    Header(#[from] reqwest::header::InvalidHeaderValue),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Failed to decode events response: {0}")]
    Decode(#[from] serde_json::Error),
}

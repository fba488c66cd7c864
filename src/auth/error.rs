use thiserror::Error;

/// Custom error types for session resolution.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No session cookie available (pass --cookie or run interactively)")]
    MissingCookie,

    #[error("Session cookie rejected by tadpoles (HTTP {status})")]
    InvalidCookie { status: u16 },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    State(#[from] crate::state::StateError),
}

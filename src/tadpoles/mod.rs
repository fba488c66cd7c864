//! Client for the tadpoles.com remote API.
//!
//! Two endpoints matter: the events feed, queried one time window at a
//! time, and the attachment endpoint the media bodies come from. Both
//! require the session headers resolved by [`crate::auth`].

pub mod client;
pub mod error;
pub mod types;

pub use client::{EventsClient, PAGE_SIZE, TADPOLES_BASE_URL};
pub use error::RemoteError;
pub use types::{AttachmentRef, Download, Event, EventsPage};

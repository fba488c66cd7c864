//! Tadpoles session management.
//!
//! There is no programmatic login: parents sign in through a Google OAuth
//! popup in a real browser and the resulting cookie is what this module
//! works with. Resolution order is a cookie passed on the command line,
//! then the cookie cached in the state database, then an interactive
//! prompt, each candidate validated against the parents page before use.

pub mod error;
pub mod session;

pub use error::AuthError;
pub use session::{SessionCredentials, SessionProvider, DEFAULT_USER_AGENT};

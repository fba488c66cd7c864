use std::sync::Arc;

use rand::Rng;
use reqwest::Client;

use crate::state::{RecordKind, StateDb};

use super::error::AuthError;

/// Browser user agent presented on every tadpoles request. The API refuses
/// clients it does not recognize, so this matches a real desktop Firefox.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:69.0) Gecko/20100101 Firefox/69.0";

/// Credentials attached to every authenticated tadpoles request.
#[derive(Clone)]
pub struct SessionCredentials {
    /// Account email, sent as the `X-TADPOLES-UID` header.
    pub uid: String,
    /// Raw `Cookie` header value for www.tadpoles.com.
    pub cookie: String,
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("uid", &self.uid)
            .field("cookie", &"<redacted>")
            .finish()
    }
}

/// Outcome of probing the parents page with a candidate cookie.
enum Probe {
    /// Probe returned 200; the page body is kept for the diagnostic capture.
    Valid { body: String },
    /// Anything else, typically a 302 to the login page.
    Invalid { status: u16 },
}

/// Resolves a working session cookie.
///
/// Tadpoles logins go through a Google OAuth popup that cannot be driven
/// headlessly, so this never logs in by itself. It resolves a cookie from,
/// in order: an explicit override, the copy cached in the state database,
/// or an interactive prompt. Every candidate is probed against the parents
/// page before it is handed to the sync loop.
pub struct SessionProvider {
    client: Client,
    base_url: String,
    state: Arc<dyn StateDb>,
    uid: String,
    cookie_override: Option<String>,
    allow_prompt: bool,
    /// Short randomized pause ahead of each probe, off in tests.
    paced: bool,
}

impl SessionProvider {
    pub fn new(
        client: Client,
        base_url: String,
        state: Arc<dyn StateDb>,
        uid: String,
        cookie_override: Option<String>,
        allow_prompt: bool,
    ) -> Self {
        Self {
            client,
            base_url,
            state,
            uid,
            cookie_override,
            allow_prompt,
            paced: true,
        }
    }

    #[cfg(test)]
    fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }

    /// Resolve validated session credentials.
    ///
    /// A cookie supplied as an override always wins and is cached for later
    /// runs once it probes clean. Otherwise the cached cookie is tried, and
    /// as a last resort the user is prompted (when running interactively).
    pub async fn obtain(&self) -> Result<SessionCredentials, AuthError> {
        if let Some(cookie) = &self.cookie_override {
            tracing::debug!("Validating session cookie supplied via flag/environment");
            return match self.probe(cookie).await? {
                Probe::Valid { body } => {
                    self.cache_session(cookie, &body).await?;
                    Ok(self.credentials(cookie))
                }
                Probe::Invalid { status } => Err(AuthError::InvalidCookie { status }),
            };
        }

        if let Some(cookie) = self.state.load_record(RecordKind::Cookie).await? {
            tracing::debug!("Validating session cookie cached in the state database");
            match self.probe(&cookie).await? {
                Probe::Valid { .. } => return Ok(self.credentials(&cookie)),
                Probe::Invalid { status } => {
                    tracing::warn!(status, "Cached session cookie is no longer valid");
                }
            }
        }

        if !self.allow_prompt {
            return Err(AuthError::MissingCookie);
        }

        let cookie = tokio::task::block_in_place(|| {
            rpassword::prompt_password("Paste the www.tadpoles.com session cookie: ").ok()
        })
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or(AuthError::MissingCookie)?;

        match self.probe(&cookie).await? {
            Probe::Valid { body } => {
                self.cache_session(&cookie, &body).await?;
                Ok(self.credentials(&cookie))
            }
            Probe::Invalid { status } => Err(AuthError::InvalidCookie { status }),
        }
    }

    /// Hit the parents page with the candidate cookie.
    ///
    /// The session is valid only on a plain 200; an expired cookie gets a
    /// 302 to the login page instead, which the client must not follow.
    /// Each probe is preceded by a randomized one-to-three second pause,
    /// the pacing the site expects from an interactive session.
    async fn probe(&self, cookie: &str) -> Result<Probe, AuthError> {
        if self.paced {
            let millis = rand::thread_rng().gen_range(1_000..3_000);
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
        }

        let url = format!("{}/parents", self.base_url);
        let resp = self
            .client
            .get(&url)
            .header(reqwest::header::COOKIE, cookie)
            .send()
            .await?;

        let status = resp.status();
        if status == reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            Ok(Probe::Valid { body })
        } else {
            Ok(Probe::Invalid {
                status: status.as_u16(),
            })
        }
    }

    /// Persist a freshly validated cookie, plus a capture of the parents
    /// page for diagnosing session problems later.
    async fn cache_session(&self, cookie: &str, page_body: &str) -> Result<(), AuthError> {
        self.state.save_record(RecordKind::Cookie, cookie).await?;
        self.state
            .save_record(RecordKind::Screenshot, page_body)
            .await?;
        tracing::info!("Session cookie validated and cached");
        Ok(())
    }

    fn credentials(&self, cookie: &str) -> SessionCredentials {
        SessionCredentials {
            uid: self.uid.clone(),
            cookie: cookie.to_string(),
        }
    }
}

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, COOKIE, CONTENT_DISPOSITION, REFERER};
use reqwest::Client;

use crate::auth::SessionCredentials;

use super::error::RemoteError;
use super::types::{Download, Event, EventsPage};

/// Production service root.
pub const TADPOLES_BASE_URL: &str = "https://www.tadpoles.com";

/// Events returned per query. The feed has no cursor; a full page means the
/// window may hold more, never that the walk is finished.
pub const PAGE_SIZE: u32 = 300;

/// Authenticated client for the tadpoles remote API.
///
/// The base URL is injectable so tests can point it at a local mock server;
/// production callers use [`TADPOLES_BASE_URL`].
pub struct EventsClient {
    client: Client,
    base_url: String,
    /// Identity and session headers sent with every API request.
    headers: HeaderMap,
}

impl EventsClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        creds: &SessionCredentials,
    ) -> Result<Self, RemoteError> {
        let base_url = base_url.into();

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert("X-TADPOLES-UID", HeaderValue::from_str(&creds.uid)?);
        headers.insert("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));
        headers.insert(
            REFERER,
            HeaderValue::from_str(&format!("{}/parents", base_url))?,
        );
        headers.insert(COOKIE, HeaderValue::from_str(&creds.cookie)?);

        Ok(Self {
            client,
            base_url,
            headers,
        })
    }

    /// Fetch one page of events with times inside `[start, end]`.
    ///
    /// Returns at most [`PAGE_SIZE`] events; an empty list means the window
    /// holds nothing. The service only accepts a bare 200 here; any other
    /// status is a [`RemoteError`], with the login redirect an expired
    /// session gets classified as invalid-session.
    pub async fn fetch_page(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>, RemoteError> {
        let url = format!(
            "{}/remote/v1/events?direction=range&earliest_event_time={}&latest_event_time={}&num_events={}&client=dashboard",
            self.base_url,
            start.timestamp(),
            end.timestamp(),
            PAGE_SIZE
        );
        tracing::debug!(%url, "Fetching events page");

        let resp = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(status_error(status, url));
        }

        let body = resp.text().await?;
        let page: EventsPage = serde_json::from_str(&body)?;
        Ok(page.events)
    }

    /// Download one attachment body, buffered in memory.
    ///
    /// The stored object's basename comes verbatim from the response's
    /// `Content-Disposition` filename.
    pub async fn download_attachment(&self, key: &str) -> Result<Download, RemoteError> {
        let url = format!(
            "{}/remote/v1/attachment?key={}&download=true",
            self.base_url, key
        );
        tracing::debug!(key, "Downloading attachment");

        let resp = self
            .client
            .get(&url)
            .headers(self.headers.clone())
            .send()
            .await?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(status_error(status, url));
        }

        let filename = resp
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename)
            .map(str::to_string)
            .ok_or(RemoteError::MissingDisposition)?;

        let bytes = resp.bytes().await?;
        Ok(Download { filename, bytes })
    }
}

/// Classify a non-200 API status.
///
/// With redirects disabled, an expired session surfaces as the 302 to the
/// login page; 401/403 cover the same condition on direct rejections.
fn status_error(status: reqwest::StatusCode, url: String) -> RemoteError {
    match status.as_u16() {
        302 | 401 | 403 => RemoteError::InvalidSession {
            status: status.as_u16(),
            url,
        },
        status => RemoteError::Status { status, url },
    }
}

/// Pull the filename component out of a `Content-Disposition` value.
fn disposition_filename(header: &str) -> Option<&str> {
    let rest = header.split("filename=").nth(1)?;
    let name = rest.split(';').next().unwrap_or("").trim().trim_matches('"');
    (!name.is_empty()).then_some(name)
}

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;

use super::error::StorageError;
use super::ObjectStore;

/// Object store speaking plain HTTP PUT against a bucket endpoint.
///
/// Objects go to `<base>/<bucket>/<path>` with the declared content type
/// and an optional bearer token. PUT-replaces-object semantics are assumed
/// of the endpoint, which holds for S3/GCS-style gateways.
pub struct HttpObjectStore {
    client: Client,
    base_url: String,
    bucket: String,
    token: Option<String>,
}

impl HttpObjectStore {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            bucket: bucket.into(),
            token,
        }
    }
}

impl std::fmt::Debug for HttpObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpObjectStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put(&self, path: &str, content_type: &str, bytes: Bytes) -> Result<(), StorageError> {
        let url = format!("{}/{}/{}", self.base_url, self.bucket, path);
        let size = bytes.len();

        let mut req = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(bytes);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await.map_err(|e| StorageError::Http {
            path: path.to_string(),
            source: e,
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(StorageError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            });
        }

        tracing::debug!(path, size, "Stored object via HTTP");
        Ok(())
    }
}

//! Primary tier: an HTTP object store with S3-style path addressing.
//!
//! Objects live at `{endpoint}/{bucket}/{name}` and are manipulated with
//! plain PUT/GET/HEAD/DELETE. Authentication, when configured, is a Bearer
//! token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::tier::{ByteSource, StorageTier, TierError, TierStat};

/// Durability source of truth for the tiered store.
pub struct ObjectStoreTier {
    http: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl ObjectStoreTier {
    /// Creates a client for the object store at `endpoint`, storing objects
    /// in `bucket`. `token`, when present, is sent as a Bearer credential
    /// on every request.
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        token: Option<&str>,
    ) -> Result<Self, TierError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| TierError::Unavailable("invalid credential token".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| TierError::Unavailable(e.to_string()))?;

        Ok(Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
        })
    }

    fn object_url(&self, name: &str) -> String {
        let key = utf8_percent_encode(name, NON_ALPHANUMERIC);
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

fn transport_err(e: reqwest::Error) -> TierError {
    TierError::Unavailable(e.to_string())
}

fn status_err(op: &str, status: reqwest::StatusCode) -> TierError {
    if status == reqwest::StatusCode::NOT_FOUND {
        TierError::NotFound
    } else {
        TierError::Unavailable(format!("{op} returned {status}"))
    }
}

/// Parses an HTTP `Last-Modified` header (RFC 2822 date).
fn parse_last_modified(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    let raw = headers.get(reqwest::header::LAST_MODIFIED)?.to_str().ok()?;
    DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Extracts an ETag, stripping surrounding quotes.
fn parse_etag(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(reqwest::header::ETAG)?.to_str().ok()?;
    Some(raw.trim_matches('"').to_string())
}

#[async_trait]
impl StorageTier for ObjectStoreTier {
    fn label(&self) -> &'static str {
        "object-store"
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), TierError> {
        let resp = self
            .http
            .put(self.object_url(name))
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TierError::Unavailable(format!("put returned {status}")));
        }
        tracing::debug!(name, size = bytes.len(), "object written to object store");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<ByteSource, TierError> {
        let resp = self
            .http
            .get(self.object_url(name))
            .send()
            .await
            .map_err(transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_err("get", status));
        }

        let size = resp.content_length();
        let stream = Box::pin(resp.bytes_stream().map_err(std::io::Error::other));
        let reader = tokio_util::io::StreamReader::new(stream);
        Ok(ByteSource::from_reader(Box::new(reader), size))
    }

    async fn stat(&self, name: &str) -> Result<TierStat, TierError> {
        let resp = self
            .http
            .head(self.object_url(name))
            .send()
            .await
            .map_err(transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_err("stat", status));
        }

        let size = resp.content_length().unwrap_or(0);
        let last_modified = parse_last_modified(resp.headers()).unwrap_or_else(Utc::now);
        let version = parse_etag(resp.headers()).unwrap_or_default();
        Ok(TierStat {
            size,
            last_modified,
            version,
        })
    }

    async fn delete(&self, name: &str) -> Result<(), TierError> {
        let resp = self
            .http
            .delete(self.object_url(name))
            .send()
            .await
            .map_err(transport_err)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(status_err("delete", status));
        }
        tracing::debug!(name, "object deleted from object store");
        Ok(())
    }
}

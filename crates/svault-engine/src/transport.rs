//! Sink transport abstraction and its HTTP implementation.
//!
//! Wire contracts:
//! - send: `POST <sinkUrl>` multipart, one `file` field holding
//!   `Ciphertext || Tag` under a random filename; 2xx JSON response with
//!   `attachments[0].url`. Rate-limit state rides on
//!   `X-RateLimit-Remaining` / `X-RateLimit-Reset-After` headers.
//! - fetch: `GET <chunkUrl>` returning the raw ciphertext-with-tag bytes.
//! - refresh: `POST <refreshEndpoint>` with `{"attachmentUrls": [...]}`,
//!   response `{"refreshedUrls": [{"original", "refreshed"}]}`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use svault_core::{VaultError, VaultResult};

/// Rate-limit state carried on a sink response. Either field may be
/// missing; the dispatch queue applies the documented defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RateLimit {
    pub remaining: Option<u32>,
    pub reset_after_secs: Option<f64>,
}

/// A successful chunk send.
#[derive(Debug, Clone)]
pub struct SinkResponse {
    /// Provider-assigned attachment URL for the stored blob.
    pub url: String,
    pub rate_limit: RateLimit,
}

/// One entry of a link-refresh response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshedLink {
    pub original: String,
    pub refreshed: String,
}

/// A single send attempt's failure, as seen by the dispatch queue.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP 429. Retryable once the attached rate state is applied.
    #[error("rate limited by sink")]
    RateLimited(RateLimit),

    #[error("{0}")]
    Failed(String),
}

#[async_trait]
pub trait SinkTransport: Send + Sync {
    /// One send attempt of a chunk's ciphertext to a sink. Retries live
    /// in the dispatch queue, not here.
    async fn send_chunk(
        &self,
        sink_url: &str,
        payload: Bytes,
    ) -> Result<SinkResponse, TransportError>;

    /// Fetch a chunk's ciphertext-with-tag bytes from its link.
    async fn fetch_chunk(&self, url: &str) -> VaultResult<Bytes>;

    /// Exchange a batch of (possibly expired) links for fresh ones.
    /// Entries may be omitted from the response; callers match by the
    /// `original` field, never by position.
    async fn refresh_links(&self, urls: &[String]) -> VaultResult<Vec<RefreshedLink>>;
}

#[derive(Debug, Deserialize)]
struct AttachmentBody {
    #[serde(default)]
    attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    url: String,
}

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "attachmentUrls")]
    attachment_urls: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "refreshedUrls", default)]
    refreshed_urls: Vec<RefreshedLink>,
}

/// reqwest-backed transport used in production.
pub struct HttpTransport {
    client: reqwest::Client,
    refresh_endpoint: String,
}

impl HttpTransport {
    pub fn new(refresh_endpoint: impl Into<String>) -> VaultResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| VaultError::Config(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            refresh_endpoint: refresh_endpoint.into(),
        })
    }
}

fn parse_rate_limit(headers: &reqwest::header::HeaderMap) -> RateLimit {
    // Absent or unparsable headers are simply None; never an error.
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    RateLimit {
        remaining: get("X-RateLimit-Remaining").and_then(|v| v.parse().ok()),
        reset_after_secs: get("X-RateLimit-Reset-After").and_then(|v| v.parse().ok()),
    }
}

#[async_trait]
impl SinkTransport for HttpTransport {
    async fn send_chunk(
        &self,
        sink_url: &str,
        payload: Bytes,
    ) -> Result<SinkResponse, TransportError> {
        let filename = uuid::Uuid::new_v4().to_string();
        let part = reqwest::multipart::Part::stream(payload).file_name(filename);
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(sink_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TransportError::Failed(format!("posting to sink: {e}")))?;

        let rate_limit = parse_rate_limit(response.headers());
        let status = response.status();

        if status.as_u16() == 429 {
            debug!(sink = sink_url, "sink returned 429");
            return Err(TransportError::RateLimited(rate_limit));
        }
        if !status.is_success() {
            return Err(TransportError::Failed(format!("sink returned {status}")));
        }

        let body: AttachmentBody = response
            .json()
            .await
            .map_err(|e| TransportError::Failed(format!("malformed sink response: {e}")))?;

        let url = body
            .attachments
            .into_iter()
            .next()
            .map(|a| a.url)
            .ok_or_else(|| TransportError::Failed("sink response has no attachments".into()))?;

        Ok(SinkResponse { url, rate_limit })
    }

    async fn fetch_chunk(&self, url: &str) -> VaultResult<Bytes> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VaultError::Other(anyhow::anyhow!("fetching chunk {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(VaultError::Other(anyhow::anyhow!(
                "fetching chunk {url}: status {}",
                response.status()
            )));
        }

        response
            .bytes()
            .await
            .map_err(|e| VaultError::Other(anyhow::anyhow!("reading chunk {url}: {e}")))
    }

    async fn refresh_links(&self, urls: &[String]) -> VaultResult<Vec<RefreshedLink>> {
        if self.refresh_endpoint.is_empty() {
            return Err(VaultError::RefreshFailed(
                "refresh endpoint not configured".into(),
            ));
        }

        let response = self
            .client
            .post(&self.refresh_endpoint)
            .json(&RefreshRequest {
                attachment_urls: urls,
            })
            .send()
            .await
            .map_err(|e| VaultError::RefreshFailed(format!("refresh request: {e}")))?;

        if !response.status().is_success() {
            return Err(VaultError::RefreshFailed(format!(
                "refresh endpoint returned {}",
                response.status()
            )));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| VaultError::RefreshFailed(format!("malformed refresh response: {e}")))?;

        Ok(body.refreshed_urls)
    }
}

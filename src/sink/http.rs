//! HTTP sink
//!
//! Posts each payload to the ingestion endpoint as `application/json`.
//! Any 2xx response is a success. Everything else, including transport
//! errors and timeouts, comes back as a `SinkError` which the delivery
//! processor treats as retryable.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::debug;
use url::Url;

use crate::sink::Sink;
use crate::utils::error::SinkError;

/// Longest slice of an error response body kept for diagnostics.
const MAX_ERROR_BODY_CHARS: usize = 512;
/// Bytes read off an error response; enough for the kept characters even
/// when every one of them is four bytes of UTF-8.
const MAX_ERROR_BODY_BYTES: usize = MAX_ERROR_BODY_CHARS * 4;

/// [`Sink`] posting to one fixed endpoint through a pooled client.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSink {
    /// Builds a sink posting to `base_url` joined with `path`.
    ///
    /// `base_url` may or may not end with `/`, and `path` may or may not
    /// start with one; exactly one separator ends up between them.
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self, SinkError> {
        let endpoint = endpoint_url(base_url, path)?;
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

pub(crate) fn endpoint_url(base_url: &str, path: &str) -> Result<Url, SinkError> {
    let joined = format!(
        "{}/{}",
        base_url.trim().trim_end_matches('/'),
        path.trim().trim_start_matches('/')
    );
    let url = Url::parse(&joined).map_err(|e| SinkError::InvalidUrl(format!("{joined}: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SinkError::InvalidUrl(format!(
            "{joined}: unsupported scheme `{other}`"
        ))),
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, payload: &[u8]) -> Result<(), SinkError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(status = status.as_u16(), "sink accepted payload");
            return Ok(());
        }

        Err(SinkError::Status {
            status: status.as_u16(),
            body: read_error_body(response).await,
        })
    }
}

/// Reads at most `MAX_ERROR_BODY_BYTES` of `response` chunk by chunk, so a
/// large error page is never buffered whole.
///
/// Best-effort: a read error ends the body early and the status is still
/// reported.
async fn read_error_body(mut response: reqwest::Response) -> String {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < MAX_ERROR_BODY_BYTES {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                let room = MAX_ERROR_BODY_BYTES - buf.len();
                buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "could not read sink error body");
                break;
            }
        }
    }

    String::from_utf8_lossy(&buf)
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect()
}

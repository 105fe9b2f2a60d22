//! The `sink` module delivers outbound payloads to the downstream ingestion
//! API.
//!
//! `Sink` is the seam the delivery processor depends on; `HttpSink` is the
//! production implementation backed by a pooled `reqwest::Client`.

pub mod http;

use async_trait::async_trait;

use crate::utils::error::SinkError;
pub use http::HttpSink;

/// Path on the ingestion API that accepts weather logs.
pub const DEFAULT_PATH: &str = "/api/v1/weather/logs";

/// One delivery attempt against the downstream API.
///
/// Implementations must be safe to share across delivery tasks.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn send(&self, payload: &[u8]) -> Result<(), SinkError>;
}

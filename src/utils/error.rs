//! The `error` module defines the error types used across `weather-relay`.
//!
//! Each stage of the relay has its own enum so that callers can match on
//! exactly the failures that stage can produce:
//!
//! - `ConnectError`: broker dial/channel/consume setup, always retried.
//! - `TransformError`: payload parsing, never retried.
//! - `SinkError`: downstream HTTP failures, retried up to the configured limit.
//! - `ResolveError`: ack/nack failures, logged and otherwise ignored.
//! - `RelayError`: process-level failures surfaced by the binary.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("dial error: {0}")]
    Dial(String),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("consume error: {0}")]
    Consume(String),

    #[error("delivery stream error: {0}")]
    Stream(String),
}

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// The downstream sink could not accept a payload.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("sink returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("sink request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid sink url: {0}")]
    InvalidUrl(String),
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("ack error: {0}")]
    Ack(String),

    #[error("nack error: {0}")]
    Nack(String),
}

#[derive(Error, Debug)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid setting `{key}`: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RelayError>;

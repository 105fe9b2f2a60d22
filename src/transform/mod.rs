//! The `transform` module reshapes raw queue payloads into what the
//! downstream API expects.
//!
//! Everything here is pure: no I/O and no shared state, so the functions can
//! be called from any number of delivery tasks at once.

pub mod weather;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::utils::error::TransformError;
pub use weather::{RawWeatherRecord, SimplifiedWeatherRecord};

/// How a delivery body is turned into the outbound request body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformMode {
    /// Parse the raw record and forward only the simplified projection.
    #[default]
    Simplify,
    /// Forward the body untouched.
    Passthrough,
}

/// Parses `raw` as a [`RawWeatherRecord`] and projects it.
///
/// The body must be a JSON object; arrays are rejected even though serde
/// would happily map them onto the struct positionally.
pub fn simplify(raw: &[u8]) -> Result<SimplifiedWeatherRecord, TransformError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| TransformError::MalformedPayload(e.to_string()))?;

    if !value.is_object() {
        return Err(TransformError::MalformedPayload(
            "payload is not a JSON object".to_string(),
        ));
    }

    let record: RawWeatherRecord = serde_json::from_value(value)
        .map_err(|e| TransformError::MalformedPayload(e.to_string()))?;

    Ok(record.into())
}

pub fn serialize(record: &SimplifiedWeatherRecord) -> Result<Vec<u8>, TransformError> {
    serde_json::to_vec(record).map_err(TransformError::Serialization)
}

/// Produces the outbound body for `raw` according to `mode`.
pub fn prepare(mode: TransformMode, raw: &[u8]) -> Result<Vec<u8>, TransformError> {
    match mode {
        TransformMode::Simplify => serialize(&simplify(raw)?),
        TransformMode::Passthrough => Ok(raw.to_vec()),
    }
}

//! Weather record definitions
//!
//! `RawWeatherRecord` mirrors what the upstream collector publishes.
//! `SimplifiedWeatherRecord` is the subset the ingestion API accepts.
//!
//! Notes on fields:
//! - `id`, `fetched_at`, `latitude`, `longitude` and `temperature` are
//!   required; a body without them is malformed
//! - every other field is optional and is skipped on serialization when
//!   absent, so "absent" never turns into `0` or `null` downstream
//! - `raw` keeps whatever provider payload the collector attached

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWeatherRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    pub fetched_at: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_speed: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wind_direction: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplifiedWeatherRecord {
    pub id: String,
    pub fetched_at: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precipitation_probability: Option<f64>,
}

impl From<RawWeatherRecord> for SimplifiedWeatherRecord {
    fn from(raw: RawWeatherRecord) -> Self {
        Self {
            id: raw.id,
            fetched_at: raw.fetched_at,
            latitude: raw.latitude,
            longitude: raw.longitude,
            temperature: raw.temperature,
            humidity: raw.humidity,
            precipitation_probability: raw.precipitation_probability,
        }
    }
}

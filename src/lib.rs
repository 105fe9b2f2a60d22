//! # weather-relay
//!
//! `weather-relay` consumes weather observations from a RabbitMQ queue,
//! reshapes them and forwards them to an HTTP ingestion API, acknowledging
//! each message only once the API has accepted it.
//!
//! ## Core Modules
//!
//! - `relay`: broker session lifecycle, per-delivery processing and the
//!   supervisor that restarts lost sessions.
//! - `transform`: pure mapping from the raw record to the outbound body.
//! - `sink`: the downstream HTTP client.
//! - `store`: the last payload relayed, shared with the HTTP surface.
//! - `transport`: health check and latest-payload HTTP endpoints.
//! - `config`: layered configuration loading and validation.
//! - `utils`: error types and logging setup.

pub mod config;
pub mod relay;
pub mod sink;
pub mod store;
pub mod transform;
pub mod transport;
pub mod utils;

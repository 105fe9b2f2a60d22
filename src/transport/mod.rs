//! The `transport` module exposes the relay over HTTP.
//!
//! It serves a liveness probe and the most recent payload the relay
//! forwarded downstream, read from the shared `LatestStore`.

pub mod http;

pub use http::{router, serve};

//! The `store` module keeps the last payload relayed downstream so the HTTP
//! surface can serve it.
//!
//! It is an owned component handed around behind an `Arc`, shared by every
//! delivery task (writers) and the HTTP handlers (readers).

pub mod latest;

pub use latest::{LatestStore, Snapshot};

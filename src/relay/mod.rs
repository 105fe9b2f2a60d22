//! The `relay` module moves messages from the broker to the downstream sink.
//!
//! - `connection`: `ConnectionManager`, one broker session and its read loop
//! - `processor`: `DeliveryProcessor`, resolves a single delivery
//! - `supervisor`: `RelaySupervisor`, restarts sessions until shutdown
//! - `broker`/`amqp`: broker traits and their lapin implementation
//! - `delivery`: the `Delivery` handle and its `Acknowledger`
//! - `backoff`: retry policy between send attempts

pub mod amqp;
pub mod backoff;
pub mod broker;
pub mod connection;
pub mod delivery;
pub mod processor;
pub mod supervisor;

pub use amqp::LapinConnector;
pub use backoff::{BackoffKind, RetryPolicy};
pub use connection::{ConnectionManager, ConnectionState, SessionEnd};
pub use delivery::{Acknowledger, Delivery};
pub use processor::DeliveryProcessor;
pub use supervisor::RelaySupervisor;

#[cfg(test)]
pub(crate) mod test_support;

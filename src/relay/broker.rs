//! Broker abstractions used by the connection manager.
//!
//! The three traits follow the setup order against the broker: dial a
//! connection, open a channel on it, start consuming on the channel. The
//! lapin-backed implementations live in `relay::amqp`.

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::relay::delivery::Delivery;
use crate::utils::error::ConnectError;

/// Inbound deliveries of one consumer. The stream ending means the consumer
/// (or its channel or connection) is gone.
pub type DeliveryStream = BoxStream<'static, Result<Delivery, ConnectError>>;

/// Opens connections to the broker.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn dial(&self) -> Result<Box<dyn BrokerConnection>, ConnectError>;
}

/// A live broker connection; channels are opened on it.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, ConnectError>;

    /// Closes the connection. Errors are logged by the implementation.
    async fn close(&self);
}

/// A channel owned by a single connection manager.
#[async_trait]
pub trait BrokerChannel: Send + Sync {
    /// Starts consuming `queue` with manual acknowledgement: no auto-ack,
    /// not exclusive, no-local off and no extra arguments.
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectError>;

    /// Closes the channel. Errors are logged by the implementation.
    async fn close(&self);
}

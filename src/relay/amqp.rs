//! AMQP transport backed by `lapin`.
//!
//! Implements the broker traits for RabbitMQ and adapts lapin deliveries
//! into [`Delivery`] handles. Also provides [`fetch_one`], a one-shot
//! `basic.get` used by the CLI to inspect the queue.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicConsumeOptions, BasicGetOptions, BasicNackOptions};
use lapin::types::FieldTable;
use lapin::{Channel, Connection, ConnectionProperties};
use tracing::{debug, warn};

use crate::relay::broker::{BrokerChannel, BrokerConnection, Connector, DeliveryStream};
use crate::relay::delivery::{Acknowledger, Delivery};
use crate::utils::error::{ConnectError, ResolveError};

const REPLY_SUCCESS: u16 = 200;

#[derive(Debug, Clone)]
pub struct LapinConnector {
    url: String,
}

impl LapinConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for LapinConnector {
    async fn dial(&self) -> Result<Box<dyn BrokerConnection>, ConnectError> {
        let conn = Connection::connect(&self.url, ConnectionProperties::default())
            .await
            .map_err(|e| ConnectError::Dial(e.to_string()))?;

        // Informational only: teardown is driven by the delivery stream ending.
        conn.on_error(|err| {
            warn!(error = %err, "AMQP connection closed unexpectedly");
        });

        Ok(Box::new(LapinConnection { conn }))
    }
}

struct LapinConnection {
    conn: Connection,
}

#[async_trait]
impl BrokerConnection for LapinConnection {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, ConnectError> {
        let channel = self
            .conn
            .create_channel()
            .await
            .map_err(|e| ConnectError::Channel(e.to_string()))?;
        Ok(Box::new(LapinChannel { channel }))
    }

    async fn close(&self) {
        if !self.conn.status().connected() {
            return;
        }
        if let Err(e) = self.conn.close(REPLY_SUCCESS, "relay closing").await {
            debug!(error = %e, "error closing AMQP connection");
        }
    }
}

struct LapinChannel {
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for LapinChannel {
    async fn consume(
        &self,
        queue: &str,
        consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectError> {
        let options = BasicConsumeOptions {
            no_local: false,
            no_ack: false,
            exclusive: false,
            nowait: false,
        };
        let consumer = self
            .channel
            .basic_consume(queue, consumer_tag, options, FieldTable::default())
            .await
            .map_err(|e| ConnectError::Consume(e.to_string()))?;

        let stream = consumer.map(|next| {
            next.map(|d| {
                Delivery::new(d.delivery_tag, d.data, d.redelivered, LapinAcker(d.acker))
            })
            .map_err(|e| ConnectError::Stream(e.to_string()))
        });
        Ok(stream.boxed())
    }

    async fn close(&self) {
        if !self.channel.status().connected() {
            return;
        }
        if let Err(e) = self.channel.close(REPLY_SUCCESS, "relay closing").await {
            debug!(error = %e, "error closing AMQP channel");
        }
    }
}

struct LapinAcker(Acker);

#[async_trait]
impl Acknowledger for LapinAcker {
    async fn ack(&self) -> Result<(), ResolveError> {
        self.0
            .ack(BasicAckOptions { multiple: false })
            .await
            .map_err(|e| ResolveError::Ack(e.to_string()))
    }

    async fn nack(&self, requeue: bool) -> Result<(), ResolveError> {
        self.0
            .nack(BasicNackOptions {
                multiple: false,
                requeue,
            })
            .await
            .map_err(|e| ResolveError::Nack(e.to_string()))
    }
}

/// Takes a single message off `queue` with `basic.get`, acks it, and returns
/// its body. Returns `None` when the queue is empty.
pub async fn fetch_one(url: &str, queue: &str) -> Result<Option<Vec<u8>>, ConnectError> {
    let conn = Connection::connect(url, ConnectionProperties::default())
        .await
        .map_err(|e| ConnectError::Dial(e.to_string()))?;
    let conn = LapinConnection { conn };

    let result = get_and_ack(&conn, queue).await;
    conn.close().await;
    result
}

async fn get_and_ack(
    conn: &LapinConnection,
    queue: &str,
) -> Result<Option<Vec<u8>>, ConnectError> {
    let channel = conn
        .conn
        .create_channel()
        .await
        .map_err(|e| ConnectError::Channel(e.to_string()))?;
    let channel = LapinChannel { channel };

    let fetched = channel
        .channel
        .basic_get(queue, BasicGetOptions { no_ack: false })
        .await
        .map_err(|e| ConnectError::Consume(e.to_string()));

    let body = match fetched {
        Ok(Some(message)) => {
            let delivery = message.delivery;
            if let Err(e) = LapinAcker(delivery.acker).ack().await {
                warn!(error = %e, "fetched message could not be acknowledged");
            }
            Ok(Some(delivery.data))
        }
        other => other.map(|_| None),
    };

    channel.close().await;
    body
}

//! Connection manager
//!
//! Owns one broker session at a time and keeps a consumer running on it:
//! - dial, open a channel, start consuming; a failing step is retried after
//!   a delay (`reconnect_delay` for dial/channel, `consume_retry_delay` for
//!   consume), never fatal
//! - every delivery is handed to its own task; the read loop does not wait
//!   for it to be resolved
//! - when the delivery stream ends the session is closed and `run` returns
//!   `SessionEnd::StreamClosed`, leaving the restart to the supervisor
//!
//! The lifetime token is observed before and during every wait, while
//! dialing, and while waiting for the next delivery.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::BrokerSettings;
use crate::relay::broker::{BrokerChannel, BrokerConnection, Connector, DeliveryStream};
use crate::relay::processor::DeliveryProcessor;
use crate::utils::error::ConnectError;

/// Observable progress of the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    /// Waiting before retrying a failed setup step or a lost session.
    Backoff,
    Consuming,
    Stopped,
}

/// Why [`ConnectionManager::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
    StreamClosed,
}

/// Drives one broker session at a time and feeds its deliveries to the
/// [`DeliveryProcessor`].
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    processor: Arc<DeliveryProcessor>,
    queue: String,
    consumer_tag: String,
    reconnect_delay: Duration,
    consume_retry_delay: Duration,
    state: watch::Sender<ConnectionState>,
    backoff_waits: AtomicU64,
}

impl ConnectionManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        processor: Arc<DeliveryProcessor>,
        settings: &BrokerSettings,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            connector,
            processor,
            queue: settings.queue.clone(),
            consumer_tag: settings.consumer_tag.clone(),
            reconnect_delay: settings.reconnect_delay(),
            consume_retry_delay: settings.consume_retry_delay(),
            state,
            backoff_waits: AtomicU64::new(0),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Publishes `Stopped` once no further session will be started.
    pub(crate) fn mark_stopped(&self) {
        self.state.send_replace(ConnectionState::Stopped);
    }

    /// Number of setup-failure waits since the manager was created.
    pub fn backoff_waits(&self) -> u64 {
        self.backoff_waits.load(Ordering::Relaxed)
    }

    /// Runs one session. After `StreamClosed` the state is left at `Backoff`
    /// since a restart is expected; after `Cancelled` it is `Stopped`.
    pub async fn run(&self, lifetime: &CancellationToken) -> SessionEnd {
        let end = self.run_session(lifetime).await;
        let state = match end {
            SessionEnd::Cancelled => ConnectionState::Stopped,
            SessionEnd::StreamClosed => ConnectionState::Backoff,
        };
        self.state.send_replace(state);
        end
    }

    async fn run_session(&self, lifetime: &CancellationToken) -> SessionEnd {
        loop {
            if lifetime.is_cancelled() {
                return SessionEnd::Cancelled;
            }

            self.state.send_replace(ConnectionState::Connecting);
            info!(queue = %self.queue, "connecting to broker");

            let dialed = tokio::select! {
                _ = lifetime.cancelled() => return SessionEnd::Cancelled,
                dialed = self.connector.dial() => dialed,
            };
            let conn = match dialed {
                Ok(conn) => conn,
                Err(err) => {
                    if !self.backoff(lifetime, self.reconnect_delay, &err).await {
                        return SessionEnd::Cancelled;
                    }
                    continue;
                }
            };

            let channel = match conn.open_channel().await {
                Ok(channel) => channel,
                Err(err) => {
                    conn.close().await;
                    if !self.backoff(lifetime, self.reconnect_delay, &err).await {
                        return SessionEnd::Cancelled;
                    }
                    continue;
                }
            };

            let deliveries = match channel.consume(&self.queue, &self.consumer_tag).await {
                Ok(deliveries) => deliveries,
                Err(err) => {
                    channel.close().await;
                    conn.close().await;
                    if !self.backoff(lifetime, self.consume_retry_delay, &err).await {
                        return SessionEnd::Cancelled;
                    }
                    continue;
                }
            };

            info!(queue = %self.queue, "connected and consuming");
            self.state.send_replace(ConnectionState::Consuming);

            let end = self.pump(lifetime, deliveries).await;
            self.teardown(conn.as_ref(), channel.as_ref()).await;
            return end;
        }
    }

    /// Reads deliveries until the stream ends or the lifetime is cancelled,
    /// spawning one processing task per delivery.
    async fn pump(
        &self,
        lifetime: &CancellationToken,
        mut deliveries: DeliveryStream,
    ) -> SessionEnd {
        loop {
            let next = tokio::select! {
                _ = lifetime.cancelled() => return SessionEnd::Cancelled,
                next = deliveries.next() => next,
            };

            match next {
                Some(Ok(delivery)) => {
                    debug!(delivery_tag = delivery.tag(), "dispatching delivery");
                    let processor = Arc::clone(&self.processor);
                    tokio::spawn(async move {
                        processor.process(delivery).await;
                    });
                }
                Some(Err(err)) => {
                    warn!(queue = %self.queue, error = %err, "delivery stream failed");
                    return SessionEnd::StreamClosed;
                }
                None => {
                    warn!(queue = %self.queue, "delivery stream closed unexpectedly");
                    return SessionEnd::StreamClosed;
                }
            }
        }
    }

    async fn teardown(&self, conn: &dyn BrokerConnection, channel: &dyn BrokerChannel) {
        channel.close().await;
        conn.close().await;
        debug!(queue = %self.queue, "broker session closed");
    }

    /// Logs `err` and waits `delay`. Returns `false` if the lifetime was
    /// cancelled before the delay elapsed.
    async fn backoff(
        &self,
        lifetime: &CancellationToken,
        delay: Duration,
        err: &ConnectError,
    ) -> bool {
        let retry_in_ms = delay.as_millis() as u64;
        warn!(error = %err, retry_in_ms, "broker setup failed");
        self.backoff_waits.fetch_add(1, Ordering::Relaxed);
        self.state.send_replace(ConnectionState::Backoff);

        tokio::select! {
            _ = lifetime.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

//! In-memory stand-ins for the broker and the sink.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use tokio::sync::{Notify, mpsc};

use crate::config::BrokerSettings;
use crate::relay::backoff::{BackoffKind, RetryPolicy};
use crate::relay::broker::{BrokerChannel, BrokerConnection, Connector, DeliveryStream};
use crate::relay::delivery::{Acknowledger, Delivery};
use crate::sink::Sink;
use crate::utils::error::{ConnectError, ResolveError, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Ack,
    Nack { requeue: bool },
}

#[derive(Clone, Default)]
pub struct RecordingAcker {
    log: Arc<Mutex<Vec<Resolution>>>,
    resolved: Arc<Notify>,
    fail: bool,
}

impl RecordingAcker {
    /// Records resolutions but reports every one of them as failed.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn resolutions(&self) -> Vec<Resolution> {
        self.log.lock().clone()
    }

    pub async fn wait_resolved(&self) {
        while self.log.lock().is_empty() {
            self.resolved.notified().await;
        }
    }

    fn record(&self, resolution: Resolution) -> bool {
        self.log.lock().push(resolution);
        self.resolved.notify_one();
        !self.fail
    }
}

#[async_trait]
impl Acknowledger for RecordingAcker {
    async fn ack(&self) -> Result<(), ResolveError> {
        if self.record(Resolution::Ack) {
            Ok(())
        } else {
            Err(ResolveError::Ack("channel closed".to_string()))
        }
    }

    async fn nack(&self, requeue: bool) -> Result<(), ResolveError> {
        if self.record(Resolution::Nack { requeue }) {
            Ok(())
        } else {
            Err(ResolveError::Nack("channel closed".to_string()))
        }
    }
}

pub fn delivery(tag: u64, body: &[u8]) -> (Delivery, RecordingAcker) {
    let acker = RecordingAcker::default();
    (Delivery::new(tag, body.to_vec(), false, acker.clone()), acker)
}

pub const VALID_BODY: &[u8] = br#"{"id":"x1","fetched_at":"2024-01-01T00:00:00Z","latitude":1.0,"longitude":2.0,"temperature":20.5,"wind_speed":3.1}"#;

/// Fails the first `failures` calls (or every call when `None`), then succeeds.
pub struct ScriptedSink {
    failures: Option<u32>,
    calls: AtomicU32,
    bodies: Mutex<Vec<Vec<u8>>>,
}

impl ScriptedSink {
    pub fn succeed_after(failures: u32) -> Self {
        Self {
            failures: Some(failures),
            calls: AtomicU32::new(0),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn always_fail() -> Self {
        Self {
            failures: None,
            calls: AtomicU32::new(0),
            bodies: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().clone()
    }
}

#[async_trait]
impl Sink for ScriptedSink {
    async fn send(&self, payload: &[u8]) -> Result<(), SinkError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.bodies.lock().push(payload.to_vec());

        match self.failures {
            Some(n) if call > n => Ok(()),
            _ => Err(SinkError::Status {
                status: 503,
                body: "unavailable".to_string(),
            }),
        }
    }
}

pub fn policy(max_retries: u32, kind: BackoffKind, base_ms: u64) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        kind,
        base: Duration::from_millis(base_ms),
        max: Duration::from_secs(60),
        exhausted_requeue: true,
    }
}

pub fn broker_settings(reconnect_delay_ms: u64, consume_retry_delay_ms: u64) -> BrokerSettings {
    BrokerSettings {
        reconnect_delay_ms,
        consume_retry_delay_ms,
        ..BrokerSettings::default()
    }
}

/// Scripted broker shared by a fake connector and every connection and
/// channel it hands out.
#[derive(Default)]
pub struct FakeBroker {
    pub dial_failures: AtomicU32,
    pub channel_failures: AtomicU32,
    pub consume_failures: AtomicU32,
    pub dials: AtomicU32,
    pub consumes: AtomicU32,
    pub connection_closes: AtomicU32,
    pub channel_closes: AtomicU32,
    feeds: Mutex<VecDeque<DeliveryStream>>,
}

impl FakeBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn connector(self: &Arc<Self>) -> Arc<dyn Connector> {
        Arc::new(FakeConnector(Arc::clone(self)))
    }

    /// Queues a feed for the next successful consume and returns its sender.
    /// Dropping the sender ends the stream.
    pub fn push_feed(&self) -> mpsc::UnboundedSender<Delivery> {
        let (tx, rx) = mpsc::unbounded_channel();
        let stream = stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|d| (Ok::<_, ConnectError>(d), rx))
        });
        self.feeds.lock().push_back(stream.boxed());
        tx
    }

    /// Queues a feed that yields `err` and then stays open, as a consumer
    /// does when its channel fails underneath it.
    pub fn push_failing_feed(&self, err: ConnectError) {
        let feed = stream::once(async move { Err::<Delivery, _>(err) }).chain(stream::pending());
        self.feeds.lock().push_back(feed.boxed());
    }

    /// Queues a feed that ends immediately.
    pub fn push_closed_feed(&self) {
        self.feeds.lock().push_back(stream::empty().boxed());
    }

    pub fn count(counter: &AtomicU32) -> u32 {
        counter.load(Ordering::SeqCst)
    }
}

fn take_failure(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

struct FakeConnector(Arc<FakeBroker>);

#[async_trait]
impl Connector for FakeConnector {
    async fn dial(&self) -> Result<Box<dyn BrokerConnection>, ConnectError> {
        self.0.dials.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.0.dial_failures) {
            return Err(ConnectError::Dial("connection refused".to_string()));
        }
        Ok(Box::new(FakeConnection(Arc::clone(&self.0))))
    }
}

struct FakeConnection(Arc<FakeBroker>);

#[async_trait]
impl BrokerConnection for FakeConnection {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, ConnectError> {
        if take_failure(&self.0.channel_failures) {
            return Err(ConnectError::Channel("channel limit reached".to_string()));
        }
        Ok(Box::new(FakeChannel(Arc::clone(&self.0))))
    }

    async fn close(&self) {
        self.0.connection_closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeChannel(Arc<FakeBroker>);

#[async_trait]
impl BrokerChannel for FakeChannel {
    async fn consume(
        &self,
        _queue: &str,
        _consumer_tag: &str,
    ) -> Result<DeliveryStream, ConnectError> {
        if take_failure(&self.0.consume_failures) {
            return Err(ConnectError::Consume("NOT_FOUND - no queue".to_string()));
        }
        self.0.consumes.fetch_add(1, Ordering::SeqCst);
        let feed = self.0.feeds.lock().pop_front();
        Ok(feed.unwrap_or_else(|| stream::pending().boxed()))
    }

    async fn close(&self) {
        self.0.channel_closes.fetch_add(1, Ordering::SeqCst);
    }
}

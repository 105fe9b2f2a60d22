//! Delivery processor
//!
//! Resolves one delivery: transform the body, post it to the sink with
//! bounded retries, then ack on success or nack once attempts run out.
//!
//! Resolution rules:
//! - malformed body: nack without requeue, nothing is sent
//! - sink accepted: ack, then record the payload in the latest store
//! - every attempt failed: nack, requeue per `RetryPolicy::exhausted_requeue`
//!
//! Backoff sleeps happen inside the delivery's own task and are not
//! cancellable; they are bounded by the policy, so shutdown is delayed at
//! most by one policy's worth of waiting.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::relay::backoff::RetryPolicy;
use crate::relay::delivery::Delivery;
use crate::sink::Sink;
use crate::store::LatestStore;
use crate::transform::{self, TransformMode};
use crate::utils::error::SinkError;

/// Resolves deliveries against a [`Sink`] under a [`RetryPolicy`].
///
/// Shared by every delivery task behind an `Arc`.
pub struct DeliveryProcessor {
    sink: Arc<dyn Sink>,
    store: Arc<LatestStore>,
    policy: RetryPolicy,
    mode: TransformMode,
    store_simplified: bool,
}

impl DeliveryProcessor {
    pub fn new(sink: Arc<dyn Sink>, store: Arc<LatestStore>, policy: RetryPolicy) -> Self {
        Self {
            sink,
            store,
            policy,
            mode: TransformMode::default(),
            store_simplified: false,
        }
    }

    pub fn with_mode(mut self, mode: TransformMode) -> Self {
        self.mode = mode;
        self
    }

    /// Store the outbound (transformed) body instead of the original one.
    pub fn with_store_simplified(mut self, store_simplified: bool) -> Self {
        self.store_simplified = store_simplified;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn process(&self, delivery: Delivery) {
        let tag = delivery.tag();
        debug!(
            delivery_tag = tag,
            redelivered = delivery.redelivered(),
            bytes = delivery.body().len(),
            "received message"
        );

        let outbound = match transform::prepare(self.mode, delivery.body()) {
            Ok(body) => body,
            Err(err) => {
                warn!(delivery_tag = tag, error = %err, "discarding malformed message");
                if let Err(e) = delivery.nack(false).await {
                    error!(delivery_tag = tag, error = %e, "nack failed");
                }
                return;
            }
        };

        let max = self.policy.max_retries;
        let mut last_err: Option<SinkError> = None;

        for attempt in 1..=max {
            match self.sink.send(&outbound).await {
                Ok(()) => {
                    info!(delivery_tag = tag, attempt, "forwarded message to sink");
                    let latest = if self.store_simplified {
                        String::from_utf8_lossy(&outbound).into_owned()
                    } else {
                        String::from_utf8_lossy(delivery.body()).into_owned()
                    };

                    // The sink already has the payload; a failed ack only means
                    // the broker may redeliver a duplicate.
                    if let Err(e) = delivery.ack().await {
                        error!(delivery_tag = tag, error = %e, "ack failed");
                    }
                    self.store.set_latest(latest);
                    return;
                }
                Err(err) => {
                    if attempt < max {
                        let delay = self.policy.delay_for(attempt);
                        let retry_in_ms = delay.as_millis() as u64;
                        warn!(
                            delivery_tag = tag,
                            attempt,
                            max_attempts = max,
                            error = %err,
                            retry_in_ms,
                            "forward attempt failed"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            delivery_tag = tag,
                            attempt,
                            max_attempts = max,
                            error = %err,
                            "final forward attempt failed"
                        );
                    }
                    last_err = Some(err);
                }
            }
        }

        let requeue = self.policy.exhausted_requeue;
        let last_error = last_err.map(|e| e.to_string()).unwrap_or_default();
        error!(
            delivery_tag = tag,
            attempts = max,
            requeue,
            error = %last_error,
            "giving up on message"
        );
        if let Err(e) = delivery.nack(requeue).await {
            error!(delivery_tag = tag, error = %e, "nack failed");
        }
    }
}

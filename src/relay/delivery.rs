//! Delivery handle
//!
//! A `Delivery` is one message taken off the queue together with the means
//! to resolve it. `ack` and `nack` take `self` by value, so once a delivery
//! has been resolved it cannot be resolved again.

use std::fmt;

use async_trait::async_trait;

use crate::utils::error::ResolveError;

/// Resolves a single delivery against the broker.
///
/// Both operations always act on that delivery alone (`multiple = false`).
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), ResolveError>;

    async fn nack(&self, requeue: bool) -> Result<(), ResolveError>;
}

/// One message off the queue. Resolved exactly once by `ack` or `nack`.
pub struct Delivery {
    tag: u64,
    body: Vec<u8>,
    redelivered: bool,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        tag: u64,
        body: Vec<u8>,
        redelivered: bool,
        acker: impl Acknowledger + 'static,
    ) -> Self {
        Self {
            tag,
            body,
            redelivered,
            acker: Box::new(acker),
        }
    }

    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn redelivered(&self) -> bool {
        self.redelivered
    }

    pub async fn ack(self) -> Result<(), ResolveError> {
        self.acker.ack().await
    }

    pub async fn nack(self, requeue: bool) -> Result<(), ResolveError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("tag", &self.tag)
            .field("body_len", &self.body.len())
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

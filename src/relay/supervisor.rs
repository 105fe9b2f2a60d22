use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::relay::connection::{ConnectionManager, SessionEnd};

/// Keeps the connection manager running for the lifetime of the process.
///
/// Every time a session ends for any reason other than cancellation the
/// supervisor waits `reconnect_delay` and starts a new one.
pub struct RelaySupervisor {
    manager: ConnectionManager,
    reconnect_delay: Duration,
}

impl RelaySupervisor {
    pub fn new(manager: ConnectionManager, reconnect_delay: Duration) -> Self {
        Self {
            manager,
            reconnect_delay,
        }
    }

    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Returns once `lifetime` is cancelled.
    pub async fn run(&self, lifetime: CancellationToken) {
        let mut sessions: u64 = 0;

        loop {
            sessions += 1;
            match self.manager.run(&lifetime).await {
                SessionEnd::Cancelled => break,
                SessionEnd::StreamClosed => {
                    let reconnect_in_ms = self.reconnect_delay.as_millis() as u64;
                    info!(sessions, reconnect_in_ms, "disconnected from broker, reconnecting");
                    tokio::select! {
                        _ = lifetime.cancelled() => break,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }

        self.manager.mark_stopped();
        info!(queue = %self.manager.queue(), "relay stopped");
    }
}

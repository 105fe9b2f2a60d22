use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::RetrySettings;

/// Shape of the delay between send attempts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `base * attempt`
    #[default]
    Linear,
    /// `base` after every attempt
    Fixed,
}

/// Bounded retry policy for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub kind: BackoffKind,
    pub base: Duration,
    pub max: Duration,
    /// Whether a delivery that used up every attempt goes back on the queue.
    pub exhausted_requeue: bool,
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Never decreases as `attempt` grows and never exceeds `max`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let delay = match self.kind {
            BackoffKind::Linear => self.base.saturating_mul(attempt.max(1)),
            BackoffKind::Fixed => self.base,
        };
        delay.min(self.max)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries.max(1),
            kind: settings.backoff,
            base: Duration::from_millis(settings.backoff_base_ms),
            max: Duration::from_millis(settings.backoff_max_ms),
            exhausted_requeue: settings.exhausted_requeue,
        }
    }
}

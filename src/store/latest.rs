use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// The last payload that was relayed successfully, with the time it was stored.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub payload: Arc<str>,
    pub updated_at: DateTime<Utc>,
}

/// Holds the most recently relayed payload.
///
/// The value is an immutable `Arc<str>` built before the write lock is taken,
/// so a writer only swaps a pointer and readers always see a whole payload,
/// either the previous one or the new one.
#[derive(Debug, Default)]
pub struct LatestStore {
    inner: RwLock<Option<Snapshot>>,
}

impl LatestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored payload. Last writer wins.
    pub fn set_latest(&self, payload: impl Into<Arc<str>>) {
        let snapshot = Snapshot {
            payload: payload.into(),
            updated_at: Utc::now(),
        };
        *self.inner.write() = Some(snapshot);
    }

    pub fn get_latest(&self) -> Option<Arc<str>> {
        self.inner.read().as_ref().map(|s| Arc::clone(&s.payload))
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.inner.read().clone()
    }
}

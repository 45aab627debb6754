//! Per-stream projection cursors.
//!
//! A cursor is the last sequence number a projection applied for one stream.
//! Envelopes at or below the cursor are duplicates and are skipped, which
//! makes projections safe under at-least-once delivery and repeated catch-ups.

use std::collections::HashMap;
use std::sync::Mutex;

use dealspark_core::AggregateId;

use super::ProjectionError;

#[derive(Debug, Default)]
pub struct StreamCursors {
    inner: Mutex<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, aggregate_id: AggregateId) -> u64 {
        self.inner
            .lock()
            .map(|c| c.get(&aggregate_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Run `apply` for the envelope at `seq` if it is the next one for the
    /// stream, then advance the cursor.
    ///
    /// The cursor lock is held across `apply`, so two threads cannot apply
    /// the same stream out of order.
    pub fn apply_next(
        &self,
        aggregate_id: AggregateId,
        seq: u64,
        apply: impl FnOnce() -> Result<(), ProjectionError>,
    ) -> Result<bool, ProjectionError> {
        let mut cursors = self.inner.lock().map_err(|_| ProjectionError::Poisoned)?;
        let last = cursors.get(&aggregate_id).copied().unwrap_or(0);

        if seq <= last {
            return Ok(false);
        }
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        apply()?;
        cursors.insert(aggregate_id, seq);
        Ok(true)
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.inner.lock() {
            cursors.clear();
        }
    }
}

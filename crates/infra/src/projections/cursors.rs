//! Per-stream sequence cursors shared by all projections.
//!
//! A cursor records the last applied sequence number per aggregate stream:
//! replays at or below the cursor are ignored (at-least-once delivery), gaps
//! and regressions are rejected (ordering violation).

use std::collections::HashMap;
use std::sync::RwLock;

use siteops_core::AggregateId;

use super::ProjectionError;

#[derive(Debug, Default)]
pub(crate) struct StreamCursors {
    inner: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Run `apply` iff the envelope advances the stream, then move the cursor.
    ///
    /// - `sequence <= cursor`: duplicate or replay, silently skipped.
    /// - First observed event may carry any positive sequence (stores start
    ///   at 1); afterwards strict +1 increments are enforced.
    /// - The cursor only advances if `apply` succeeds, holding the lock across
    ///   the application so concurrent deliveries cannot double-apply.
    pub(crate) fn apply_gated<F>(
        &self,
        aggregate_id: AggregateId,
        sequence: u64,
        apply: F,
    ) -> Result<(), ProjectionError>
    where
        F: FnOnce() -> Result<(), ProjectionError>,
    {
        let mut cursors = match self.inner.write() {
            Ok(c) => c,
            // Poisoned lock: drop the event; the projection can be rebuilt.
            Err(_) => return Ok(()),
        };

        let last = *cursors.get(&aggregate_id).unwrap_or(&0);

        if sequence == 0 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence,
            });
        }
        if sequence <= last {
            return Ok(());
        }
        if last != 0 && sequence != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence {
                last,
                found: sequence,
            });
        }

        apply()?;
        cursors.insert(aggregate_id, sequence);
        Ok(())
    }

    pub(crate) fn clear(&self) {
        if let Ok(mut cursors) = self.inner.write() {
            cursors.clear();
        }
    }
}

//! Per-subscription ordering guard.

use crate::error::{StreamError, StreamResult};
use chartfeed_core::Bar;

/// Tracks the last bar handed to a subscriber and rejects any bar that does
/// not come strictly after it.
///
/// The baseline can be seeded from history so the first live bar is checked
/// against the last historical one.
#[derive(Debug, Clone, Default)]
pub struct OrderingGuard {
    last: Option<Bar>,
}

impl OrderingGuard {
    pub fn new(seed: Option<Bar>) -> Self {
        Self { last: seed }
    }

    /// Last emitted (or seeded) bar.
    pub fn last(&self) -> Option<&Bar> {
        self.last.as_ref()
    }

    /// Check `bar` against the baseline without updating it.
    pub fn check(&self, bar: &Bar) -> StreamResult<()> {
        match self.last {
            Some(last) if bar.time <= last.time => Err(StreamError::OrderViolation {
                last_time: last.time,
                bar_time: bar.time,
            }),
            _ => Ok(()),
        }
    }

    /// Record `bar` as emitted.
    pub fn record(&mut self, bar: Bar) {
        self.last = Some(bar);
    }
}

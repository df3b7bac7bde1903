//! OHLCV bar type.
//!
//! A `Bar` is the normalized candle shape shared by the history path, the
//! stream decoder, the aggregator and the chart callback.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV candle.
///
/// `time` is the candle open time in milliseconds since the Unix epoch.
/// The exchange guarantees `high >= max(open, close)` and
/// `low <= min(open, close)`; this type does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Create a new bar.
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Open time as a UTC timestamp, if representable.
    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.time)
    }
}

/// Coerce a JSON number or numeric text into `f64`.
///
/// The exchange sends prices and volumes as decimal strings (`"50000.10"`);
/// some fields arrive as plain numbers. Both are accepted.
pub fn coerce_f64(value: &serde_json::Value) -> CoreResult<f64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| CoreError::InvalidNumber(n.to_string())),
        serde_json::Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoreError::InvalidNumber(s.clone())),
        other => Err(CoreError::InvalidNumber(other.to_string())),
    }
}

//! Prometheus metrics for the chart datafeed.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means a duplicate metric
//! name, which is a startup defect; it can only happen on first access of a
//! static, never on a later update.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

/// Live subscriptions held by the registry.
pub static ACTIVE_SUBSCRIPTIONS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "chartfeed_active_subscriptions",
        "Number of live chart subscriptions"
    )
    .unwrap()
});

/// Socket lifecycle events.
/// Labels: event (connected/closed/failed)
pub static SOCKET_EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chartfeed_socket_events_total",
        "Stream socket lifecycle events",
        &["event"]
    )
    .unwrap()
});

/// Bars delivered to chart callbacks.
pub static BARS_EMITTED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chartfeed_bars_emitted_total",
        "Bars delivered to realtime callbacks",
        &["resolution"]
    )
    .unwrap()
});

/// Bars dropped for arriving out of order.
pub static ORDER_VIOLATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chartfeed_order_violations_total",
        "Bars rejected by the ordering guard",
        &["resolution"]
    )
    .unwrap()
});

/// History requests by outcome.
/// Labels: outcome (ok/no_data/upstream_error/transport_error)
pub static HISTORY_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "chartfeed_history_requests_total",
        "Historical kline requests by outcome",
        &["outcome"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn subscription_opened() {
        ACTIVE_SUBSCRIPTIONS.inc();
    }

    pub fn subscription_closed() {
        ACTIVE_SUBSCRIPTIONS.dec();
    }

    /// Record a socket lifecycle event.
    pub fn socket_event(event: &str) {
        SOCKET_EVENTS_TOTAL.with_label_values(&[event]).inc();
    }

    /// Record a bar handed to a realtime callback.
    pub fn bar_emitted(resolution: &str) {
        BARS_EMITTED_TOTAL.with_label_values(&[resolution]).inc();
    }

    /// Record a bar rejected by the ordering guard.
    pub fn order_violation(resolution: &str) {
        ORDER_VIOLATIONS_TOTAL
            .with_label_values(&[resolution])
            .inc();
    }

    /// Record a finished history request.
    pub fn history_request(outcome: &str) {
        HISTORY_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn gather_text() -> TelemetryResult<String> {
        let families = prometheus::gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}

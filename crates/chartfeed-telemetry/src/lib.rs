//! Prometheus metrics and structured logging for the chart datafeed.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Subscription, socket, bar and history counters

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;

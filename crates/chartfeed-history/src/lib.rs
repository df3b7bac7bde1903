//! Historical bars for the chart datafeed.
//!
//! - `HistoryClient`: REST kline fetch with error-payload detection
//! - `LastBarCache`: most recent historical bar per symbol
//! - `HistoryService`: the chart-facing fetch that ties both together

pub mod cache;
pub mod client;
pub mod error;
pub mod service;

pub use cache::LastBarCache;
pub use client::{parse_row, HistoryClient, KLINES_PATH};
pub use error::{HistoryError, HistoryResult};
pub use service::{HistoryOutcome, HistoryService, PeriodParams};

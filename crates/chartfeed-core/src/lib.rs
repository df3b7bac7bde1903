//! Core domain types for the chart datafeed.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `Bar`: one OHLCV candle
//! - `Resolution`: the chart's bar granularity, including synthetic sub-minute codes
//! - `ExchangeInterval`: the exchange's fixed kline intervals
//! - `ExchangeSymbol`: chart pair names rewritten to exchange form

pub mod bar;
pub mod error;
pub mod resolution;
pub mod symbol;

pub use bar::{coerce_f64, Bar};
pub use error::{CoreError, CoreResult};
pub use resolution::{to_exchange_interval, CandlePolicy, ExchangeInterval, Resolution};
pub use symbol::{to_exchange_symbol, ExchangeSymbol};

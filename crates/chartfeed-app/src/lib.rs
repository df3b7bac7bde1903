//! Chart datafeed adapter.
//!
//! Bridges a charting widget's datafeed interface to Binance:
//! - Capabilities, symbol search and symbol resolution from a local catalog
//! - Historical bars over REST, seeding a last-bar cache
//! - Live bars over one kline socket per chart subscription, with in-process
//!   aggregation for sub-minute synthetic resolutions

pub mod catalog;
pub mod config;
pub mod datafeed;
pub mod error;

pub use catalog::{ResolveError, SymbolCatalog, SymbolInfo};
pub use config::{AppConfig, ExchangeDescriptor, SymbolEntry, SymbolTypeDescriptor};
pub use datafeed::{Datafeed, DatafeedConfiguration};
pub use error::{AppError, AppResult};

//! Symbol catalog: search and resolution.

use crate::config::{AppConfig, SymbolEntry};
use serde::Serialize;
use thiserror::Error;

/// Symbol lookup miss. The message is what the chart's error callback shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot resolve symbol")]
pub struct ResolveError;

/// Resolved symbol metadata handed to the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolInfo {
    pub ticker: String,
    pub name: String,
    pub full_name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub symbol_type: String,
    pub session: String,
    pub timezone: String,
    pub exchange: String,
    pub minmov: u32,
    pub pricescale: u32,
    pub has_intraday: bool,
    pub has_no_volume: bool,
    pub has_weekly_and_monthly: bool,
    pub supported_resolutions: Vec<String>,
    pub volume_precision: u32,
    pub data_status: String,
}

impl SymbolInfo {
    fn from_entry(entry: &SymbolEntry, config: &AppConfig) -> Self {
        Self {
            ticker: entry.full_name.clone(),
            name: entry.symbol.clone(),
            full_name: entry.full_name.clone(),
            description: entry.description.clone(),
            symbol_type: entry.symbol_type.clone(),
            session: "24x7".to_string(),
            timezone: "Etc/UTC".to_string(),
            exchange: entry.exchange.clone(),
            minmov: 1,
            pricescale: config.pricescale,
            has_intraday: true,
            has_no_volume: false,
            has_weekly_and_monthly: true,
            supported_resolutions: config.supported_resolutions.clone(),
            volume_precision: config.volume_precision,
            data_status: "streaming".to_string(),
        }
    }
}

/// Static symbol catalog.
#[derive(Debug, Clone)]
pub struct SymbolCatalog {
    entries: Vec<SymbolEntry>,
}

impl SymbolCatalog {
    pub fn new(entries: Vec<SymbolEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[SymbolEntry] {
        &self.entries
    }

    /// Entries whose full name contains `user_input` (case-insensitive).
    /// Empty `exchange` or `symbol_type` match everything.
    pub fn search(&self, user_input: &str, exchange: &str, symbol_type: &str) -> Vec<SymbolEntry> {
        let needle = user_input.to_lowercase();
        self.entries
            .iter()
            .filter(|e| exchange.is_empty() || e.exchange == exchange)
            .filter(|e| symbol_type.is_empty() || e.symbol_type == symbol_type)
            .filter(|e| e.full_name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Exact full-name match.
    pub fn find(&self, full_name: &str) -> Option<&SymbolEntry> {
        self.entries.iter().find(|e| e.full_name == full_name)
    }

    /// Resolve `full_name` into chart metadata.
    pub fn resolve(&self, full_name: &str, config: &AppConfig) -> Result<SymbolInfo, ResolveError> {
        self.find(full_name)
            .map(|entry| SymbolInfo::from_entry(entry, config))
            .ok_or(ResolveError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> (SymbolCatalog, AppConfig) {
        let config = AppConfig::default();
        (SymbolCatalog::new(config.symbols.clone()), config)
    }

    #[test]
    fn test_search_substring_case_insensitive() {
        let (catalog, _) = catalog();
        let hits = catalog.search("btc", "", "");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].full_name, "BTC/USDT");

        assert_eq!(catalog.search("usdt", "", "").len(), 2);
        assert_eq!(catalog.search("", "", "").len(), 2);
        assert!(catalog.search("doge", "", "").is_empty());
    }

    #[test]
    fn test_search_exchange_and_type_filters() {
        let (catalog, _) = catalog();
        assert_eq!(catalog.search("", "Binance", "").len(), 2);
        assert!(catalog.search("", "Kraken", "").is_empty());
        assert_eq!(catalog.search("eth", "", "crypto").len(), 1);
        assert!(catalog.search("", "", "stock").is_empty());
    }

    #[test]
    fn test_resolve() {
        let (catalog, config) = catalog();
        let info = catalog.resolve("ETH/USDT", &config).unwrap();
        assert_eq!(info.ticker, "ETH/USDT");
        assert_eq!(info.name, "ETH/USDT");
        assert_eq!(info.description, "Ethereum vs Tether");
        assert_eq!(info.session, "24x7");
        assert_eq!(info.timezone, "Etc/UTC");
        assert_eq!(info.minmov, 1);
        assert_eq!(info.pricescale, 100);
        assert!(info.has_intraday);
        assert!(!info.has_no_volume);
        assert!(info.has_weekly_and_monthly);
        assert_eq!(info.volume_precision, 8);
        assert_eq!(info.data_status, "streaming");
        assert_eq!(info.supported_resolutions, config.supported_resolutions);
    }

    #[test]
    fn test_resolve_is_exact() {
        let (catalog, config) = catalog();
        let err = catalog.resolve("eth/usdt", &config).unwrap_err();
        assert_eq!(err.to_string(), "cannot resolve symbol");
        assert!(catalog.resolve("ETH", &config).is_err());
    }

    #[test]
    fn test_symbol_info_serializes_type_field() {
        let (catalog, config) = catalog();
        let info = catalog.resolve("BTC/USDT", &config).unwrap();
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["type"], "crypto");
        assert_eq!(json["pricescale"], 100);
    }
}

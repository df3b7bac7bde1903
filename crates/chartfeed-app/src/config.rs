//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "CHARTFEED_CONFIG";
/// Config file used when neither CLI nor environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Exchange entry advertised to the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeDescriptor {
    pub value: String,
    pub name: String,
    pub desc: String,
}

/// Symbol type entry advertised to the chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolTypeDescriptor {
    pub name: String,
    pub value: String,
}

/// One catalog symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    /// Chart symbol, e.g. `BTC/USDT`.
    pub symbol: String,
    pub full_name: String,
    pub description: String,
    pub exchange: String,
    #[serde(rename = "type")]
    pub symbol_type: String,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// REST base URL for historical klines.
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    /// WebSocket base URL for kline streams.
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    /// Resolution codes advertised to the chart, in display order.
    #[serde(default = "default_supported_resolutions")]
    pub supported_resolutions: Vec<String>,
    #[serde(default = "default_exchanges")]
    pub exchanges: Vec<ExchangeDescriptor>,
    #[serde(default = "default_symbols_types")]
    pub symbols_types: Vec<SymbolTypeDescriptor>,
    /// Symbol catalog.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<SymbolEntry>,
    #[serde(default = "default_pricescale")]
    pub pricescale: u32,
    #[serde(default = "default_volume_precision")]
    pub volume_precision: u32,
    /// REST request timeout (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Capacity of the socket event channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

fn default_rest_base_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_base_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_supported_resolutions() -> Vec<String> {
    ["1", "5", "15", "30", "60", "1D", "1W", "1M"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_exchanges() -> Vec<ExchangeDescriptor> {
    vec![ExchangeDescriptor {
        value: "Binance".to_string(),
        name: "Binance".to_string(),
        desc: "Binance Exchange".to_string(),
    }]
}

fn default_symbols_types() -> Vec<SymbolTypeDescriptor> {
    vec![SymbolTypeDescriptor {
        name: "crypto".to_string(),
        value: "crypto".to_string(),
    }]
}

fn default_symbols() -> Vec<SymbolEntry> {
    [
        ("BTC/USDT", "Bitcoin vs Tether"),
        ("ETH/USDT", "Ethereum vs Tether"),
    ]
    .iter()
    .map(|(pair, description)| SymbolEntry {
        symbol: pair.to_string(),
        full_name: pair.to_string(),
        description: description.to_string(),
        exchange: "Binance".to_string(),
        symbol_type: "crypto".to_string(),
    })
    .collect()
}

fn default_pricescale() -> u32 {
    100
}

fn default_volume_precision() -> u32 {
    8
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_event_channel_capacity() -> usize {
    1_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            ws_base_url: default_ws_base_url(),
            supported_resolutions: default_supported_resolutions(),
            exchanges: default_exchanges(),
            symbols_types: default_symbols_types(),
            symbols: default_symbols(),
            pricescale: default_pricescale(),
            volume_precision: default_volume_precision(),
            request_timeout_ms: default_request_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Resolve and load the config file: CLI path > `CHARTFEED_CONFIG` >
    /// `config/default.toml`.
    ///
    /// An explicitly named file must exist. A missing default file yields
    /// the built-in defaults.
    pub fn load(cli_path: Option<String>) -> AppResult<Self> {
        let explicit = cli_path.or_else(|| std::env::var(CONFIG_ENV).ok());

        match explicit {
            Some(path) => {
                info!(config_path = %path, "Loading configuration");
                Self::from_file(&path)
            }
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                info!(config_path = DEFAULT_CONFIG_PATH, "Loading configuration");
                Self::from_file(DEFAULT_CONFIG_PATH)
            }
            None => {
                warn!(
                    config_path = DEFAULT_CONFIG_PATH,
                    "Config file not found, using defaults"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.rest_base_url, "https://api.binance.com");
        assert_eq!(config.ws_base_url, "wss://stream.binance.com:9443");
        assert_eq!(
            config.supported_resolutions,
            vec!["1", "5", "15", "30", "60", "1D", "1W", "1M"]
        );
        assert_eq!(config.symbols.len(), 2);
        assert_eq!(config.symbols[0].description, "Bitcoin vs Tether");
        assert_eq!(config.pricescale, 100);
        assert_eq!(config.volume_precision, 8);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.event_channel_capacity, 1_000);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let shipped = AppConfig::from_toml(include_str!("../../../config/default.toml")).unwrap();
        let defaults = AppConfig::default();
        assert_eq!(shipped.rest_base_url, defaults.rest_base_url);
        assert_eq!(shipped.ws_base_url, defaults.ws_base_url);
        assert_eq!(shipped.supported_resolutions, defaults.supported_resolutions);
        assert_eq!(shipped.exchanges, defaults.exchanges);
        assert_eq!(shipped.symbols_types, defaults.symbols_types);
        assert_eq!(shipped.symbols, defaults.symbols);
        assert_eq!(shipped.request_timeout_ms, defaults.request_timeout_ms);
    }

    #[test]
    fn test_partial_override() {
        let config = AppConfig::from_toml(
            r#"
            ws_base_url = "ws://127.0.0.1:9000"
            supported_resolutions = ["5S", "1"]

            [[symbols]]
            symbol = "SOL/USDT"
            full_name = "SOL/USDT"
            description = "Solana vs Tether"
            exchange = "Binance"
            type = "crypto"
            "#,
        )
        .unwrap();

        assert_eq!(config.ws_base_url, "ws://127.0.0.1:9000");
        assert_eq!(config.rest_base_url, "https://api.binance.com");
        assert_eq!(config.supported_resolutions, vec!["5S", "1"]);
        assert_eq!(config.symbols.len(), 1);
        assert_eq!(config.symbols[0].symbol_type, "crypto");
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            AppConfig::from_toml("pricescale = \"lots\""),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(matches!(
            AppConfig::load(Some("/nonexistent/chartfeed.toml".to_string())),
            Err(AppError::Config(_))
        ));
    }
}

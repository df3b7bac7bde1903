//! Chart symbol to exchange symbol translation.
//!
//! The chart names pairs `BASE/QUOTE` (`"BTC/USDT"`). The exchange wants the
//! pair concatenated (`BTCUSDT` on REST, `btcusdt` in stream names) and quotes
//! dollar pairs in its stable coin. The fiat rewrite is lossy: `BTC/USD` and
//! `BTC/USDT` land on the same exchange symbol.

/// Delimiter between base and quote in chart symbols.
pub const PAIR_DELIMITER: char = '/';
/// Fiat quote suffix as written by the chart.
pub const FIAT_QUOTE: &str = "USD";
/// Stable-coin quote suffix used by the exchange.
pub const STABLE_QUOTE: &str = "USDT";

/// Exchange symbol, stored in canonical upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExchangeSymbol(String);

impl ExchangeSymbol {
    /// Upper-case form used by the REST API.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-case form used in stream names.
    pub fn stream_name(&self) -> String {
        self.0.to_lowercase()
    }
}

impl std::fmt::Display for ExchangeSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Translate a chart symbol into the exchange's symbol.
pub fn to_exchange_symbol(symbol: &str) -> ExchangeSymbol {
    let mut joined: String = symbol
        .trim()
        .chars()
        .filter(|c| *c != PAIR_DELIMITER)
        .collect::<String>()
        .to_uppercase();

    if joined.ends_with(FIAT_QUOTE) {
        joined.push_str(&STABLE_QUOTE[FIAT_QUOTE.len()..]);
    }

    ExchangeSymbol(joined)
}

//! REST client for historical klines.

use crate::error::{HistoryError, HistoryResult};
use chartfeed_core::{coerce_f64, Bar, ExchangeInterval, ExchangeSymbol};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Kline endpoint path.
pub const KLINES_PATH: &str = "/api/v3/klines";

/// Either rows or an error payload. Error bodies come with 4xx statuses as
/// well as occasionally with 200.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KlinesResponse {
    Rows(Vec<Vec<Value>>),
    Error { code: i64, msg: String },
}

/// Client for the exchange's kline endpoint.
pub struct HistoryClient {
    client: Client,
    base_url: String,
}

impl HistoryClient {
    /// Create a client against `base_url` (e.g. `https://api.binance.com`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> HistoryResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HistoryError::HttpClient(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn klines_url(&self) -> String {
        format!("{}{}", self.base_url, KLINES_PATH)
    }

    /// Fetch klines for `[from_s, to_s]` (Unix seconds), oldest first.
    pub async fn fetch_klines(
        &self,
        symbol: &ExchangeSymbol,
        interval: ExchangeInterval,
        from_s: i64,
        to_s: i64,
    ) -> HistoryResult<Vec<Bar>> {
        let url = self.klines_url();
        let query = [
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("startTime", from_s.saturating_mul(1000).to_string()),
            ("endTime", to_s.saturating_mul(1000).to_string()),
        ];
        info!(%url, %symbol, %interval, from_s, to_s, "Fetching klines");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| HistoryError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| HistoryError::Transport(format!("Failed to read body: {e}")))?;

        let parsed = serde_json::from_str::<KlinesResponse>(&body);
        match parsed {
            Ok(KlinesResponse::Error { code, msg }) => Err(HistoryError::Upstream { code, msg }),
            _ if !status.is_success() => Err(HistoryError::Status {
                status: status.as_u16(),
                body,
            }),
            Ok(KlinesResponse::Rows(rows)) => {
                debug!(rows = rows.len(), "Kline rows received");
                rows.iter().map(|row| parse_row(row)).collect()
            }
            Err(e) => Err(HistoryError::ParseError(format!("Unexpected body: {e}"))),
        }
    }
}

/// Parse one kline row `[openTime, open, high, low, close, volume, ...]`.
pub fn parse_row(row: &[Value]) -> HistoryResult<Bar> {
    if row.len() < 6 {
        return Err(HistoryError::ParseError(format!(
            "kline row has {} fields, expected at least 6",
            row.len()
        )));
    }

    let time = row[0]
        .as_i64()
        .ok_or_else(|| HistoryError::ParseError(format!("bad open time: {}", row[0])))?;
    let num = |i: usize| coerce_f64(&row[i]).map_err(|e| HistoryError::ParseError(e.to_string()));

    Ok(Bar::new(time, num(1)?, num(2)?, num(3)?, num(4)?, num(5)?))
}

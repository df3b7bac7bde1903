//! Chart-facing history fetch.

use crate::cache::LastBarCache;
use crate::client::HistoryClient;
use crate::error::HistoryResult;
use chartfeed_core::{to_exchange_interval, to_exchange_symbol, Bar};
use chartfeed_telemetry::Metrics;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Requested range, in Unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodParams {
    pub from: i64,
    pub to: i64,
    /// First request for this symbol/resolution in the chart session.
    pub first_data_request: bool,
}

/// Bars for the chart's history callback.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryOutcome {
    pub bars: Vec<Bar>,
    /// Set when the range holds no bars.
    pub no_data: bool,
}

/// Fetches history and keeps the last-bar cache current.
pub struct HistoryService {
    client: HistoryClient,
    cache: Arc<LastBarCache>,
}

impl HistoryService {
    pub fn new(client: HistoryClient, cache: Arc<LastBarCache>) -> Self {
        Self { client, cache }
    }

    pub fn cache(&self) -> &Arc<LastBarCache> {
        &self.cache
    }

    /// Fetch bars for a chart symbol (`symbol`, e.g. `BTC/USDT`) and
    /// resolution code.
    ///
    /// An empty range is a successful `no_data` outcome. On a first request
    /// with data, the newest bar is cached under `full_name`.
    pub async fn get_bars(
        &self,
        symbol: &str,
        full_name: &str,
        resolution: &str,
        period: PeriodParams,
    ) -> HistoryResult<HistoryOutcome> {
        let symbol = to_exchange_symbol(symbol);
        let interval = to_exchange_interval(resolution);

        let bars = match self
            .client
            .fetch_klines(&symbol, interval, period.from, period.to)
            .await
        {
            Ok(bars) => bars,
            Err(e) => {
                error!(%full_name, %resolution, error = %e, "History fetch failed");
                Metrics::history_request(e.outcome_label());
                return Err(e);
            }
        };

        if bars.is_empty() {
            info!(%full_name, %resolution, from = period.from, to = period.to, "No bars in range");
            Metrics::history_request("no_data");
            return Ok(HistoryOutcome {
                bars,
                no_data: true,
            });
        }

        for bar in &bars {
            debug!(time = bar.time, open_time = ?bar.open_time(), "History bar");
        }

        if period.first_data_request {
            if let Some(last) = bars.last() {
                self.cache.set(full_name, *last);
            }
        }

        info!(%full_name, %resolution, count = bars.len(), "History fetched");
        Metrics::history_request("ok");
        Ok(HistoryOutcome {
            bars,
            no_data: false,
        })
    }
}

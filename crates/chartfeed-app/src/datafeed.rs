//! The chart-facing datafeed adapter.
//!
//! Composes the symbol catalog, the history service and the subscription
//! registry. Construction spawns the dispatch loop, so it must happen inside
//! a tokio runtime. `dispose` tears everything down.

use crate::catalog::{ResolveError, SymbolCatalog, SymbolInfo};
use crate::config::{AppConfig, ExchangeDescriptor, SymbolEntry, SymbolTypeDescriptor};
use crate::error::AppResult;
use chartfeed_core::{Bar, Resolution};
use chartfeed_history::{
    HistoryClient, HistoryError, HistoryOutcome, HistoryService, LastBarCache, PeriodParams,
};
use chartfeed_stream::{run_dispatch, SharedRegistry, SubscriptionRegistry, SubscriptionRequest};
use chartfeed_ws::{StreamConnector, WsStreamConnector};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capabilities reported to the chart on startup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatafeedConfiguration {
    pub supported_resolutions: Vec<String>,
    pub exchanges: Vec<ExchangeDescriptor>,
    pub symbols_types: Vec<SymbolTypeDescriptor>,
}

/// Datafeed adapter.
pub struct Datafeed {
    config: AppConfig,
    catalog: SymbolCatalog,
    history: HistoryService,
    registry: SharedRegistry,
    shutdown: CancellationToken,
    dispatch_task: Option<JoinHandle<()>>,
}

impl Datafeed {
    /// Adapter backed by real kline sockets.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        Self::with_connector(config, Arc::new(WsStreamConnector::new()))
    }

    /// Adapter with a custom socket connector.
    pub fn with_connector(
        config: AppConfig,
        connector: Arc<dyn StreamConnector>,
    ) -> AppResult<Self> {
        let client = HistoryClient::new(config.rest_base_url.clone(), config.request_timeout())?;
        let history = HistoryService::new(client, Arc::new(LastBarCache::new()));

        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity.max(1));
        let registry: SharedRegistry = Arc::new(Mutex::new(SubscriptionRegistry::new(
            connector,
            events_tx,
            config.ws_base_url.clone(),
        )));

        let shutdown = CancellationToken::new();
        let dispatch_task = tokio::spawn(run_dispatch(
            registry.clone(),
            events_rx,
            shutdown.clone(),
        ));

        info!(
            rest = %config.rest_base_url,
            ws = %config.ws_base_url,
            symbols = config.symbols.len(),
            "Datafeed ready"
        );

        Ok(Self {
            catalog: SymbolCatalog::new(config.symbols.clone()),
            config,
            history,
            registry,
            shutdown,
            dispatch_task: Some(dispatch_task),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Capabilities for the chart's `onReady`.
    pub fn on_ready(&self) -> DatafeedConfiguration {
        debug!("onReady");
        DatafeedConfiguration {
            supported_resolutions: self.config.supported_resolutions.clone(),
            exchanges: self.config.exchanges.clone(),
            symbols_types: self.config.symbols_types.clone(),
        }
    }

    pub fn search_symbols(
        &self,
        user_input: &str,
        exchange: &str,
        symbol_type: &str,
    ) -> Vec<SymbolEntry> {
        let hits = self.catalog.search(user_input, exchange, symbol_type);
        debug!(%user_input, %exchange, %symbol_type, hits = hits.len(), "searchSymbols");
        hits
    }

    pub fn resolve_symbol(&self, symbol_name: &str) -> Result<SymbolInfo, ResolveError> {
        match self.catalog.resolve(symbol_name, &self.config) {
            Ok(info) => {
                info!(%symbol_name, "Symbol resolved");
                Ok(info)
            }
            Err(e) => {
                warn!(%symbol_name, "Cannot resolve symbol");
                Err(e)
            }
        }
    }

    /// Historical bars for `[period.from, period.to]`.
    ///
    /// Errors carry the exchange message verbatim when the exchange sent one.
    pub async fn get_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &str,
        period: PeriodParams,
    ) -> Result<HistoryOutcome, HistoryError> {
        self.history
            .get_bars(
                &symbol_info.name,
                &symbol_info.full_name,
                resolution,
                period,
            )
            .await
    }

    /// Start streaming bars for `subscriber_uid`.
    ///
    /// The ordering baseline is the cached last historical bar for the
    /// symbol, if any. Reusing a live id replaces that subscription.
    pub fn subscribe_bars<F, R>(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &str,
        on_realtime: F,
        subscriber_uid: &str,
        on_reset_cache_needed: R,
    ) where
        F: FnMut(Bar) + Send + 'static,
        R: FnMut() + Send + 'static,
    {
        let parsed = Resolution::from_code_or_default(resolution);
        if parsed.code() != resolution {
            warn!(%resolution, fallback = %parsed, "Unknown resolution, using fallback");
        }

        let seed = self.history.cache().get(&symbol_info.full_name);
        info!(
            %subscriber_uid,
            symbol = %symbol_info.full_name,
            resolution = %parsed,
            seed_time = ?seed.map(|b| b.time),
            "subscribeBars"
        );

        self.registry.lock().open(SubscriptionRequest {
            subscriber_id: subscriber_uid.to_string(),
            symbol: symbol_info.name.clone(),
            resolution: parsed,
            on_bar: Box::new(on_realtime),
            on_reset: Box::new(on_reset_cache_needed),
            seed,
        });
    }

    /// Stop streaming. No callback for this id runs after this returns.
    pub fn unsubscribe_bars(&self, subscriber_uid: &str) {
        info!(%subscriber_uid, "unsubscribeBars");
        self.registry.lock().close(subscriber_uid);
    }

    /// Ask the chart to drop its cached bars for a subscription.
    pub fn reset_cache(&self, subscriber_uid: &str) -> bool {
        self.registry.lock().reset_cache(subscriber_uid)
    }

    /// Cached last historical bar for a symbol's full name.
    pub fn last_bar(&self, full_name: &str) -> Option<Bar> {
        self.history.cache().get(full_name)
    }

    pub fn active_subscriptions(&self) -> usize {
        self.registry.lock().len()
    }

    /// Close every subscription and stop the dispatch loop.
    pub async fn dispose(mut self) {
        info!("Disposing datafeed");
        self.registry.lock().close_all();
        self.shutdown.cancel();
        if let Some(task) = self.dispatch_task.take() {
            if let Err(e) = task.await {
                warn!(?e, "Dispatch loop ended abnormally");
            }
        }
    }
}

impl Drop for Datafeed {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

//! Chart datafeed - command line driver.
//!
//! Resolves a symbol, loads recent history, then streams live bars until
//! Ctrl-C.

use anyhow::Result;
use chartfeed_app::{AppConfig, Datafeed};
use chartfeed_history::PeriodParams;
use chartfeed_telemetry::Metrics;
use clap::Parser;
use tracing::{debug, error, info, warn};

const SUBSCRIBER_ID: &str = "cli";

/// Stream Binance klines through the chart datafeed adapter
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via CHARTFEED_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Chart symbol to stream
    #[arg(long, default_value = "BTC/USDT")]
    symbol: String,

    /// Chart resolution code (e.g. 1, 60, 1D, 5S)
    #[arg(long, default_value = "1")]
    resolution: String,

    /// Minutes of history to load before streaming
    #[arg(long, default_value_t = 60)]
    history_minutes: i64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any TLS connection is made
    chartfeed_ws::init_crypto();

    let args = Args::parse();

    chartfeed_telemetry::init_logging()?;

    info!("Starting chartfeed v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(args.config)?;
    let feed = Datafeed::new(config)?;

    let ready = feed.on_ready();
    info!(resolutions = ?ready.supported_resolutions, "Datafeed capabilities");

    let symbol_info = feed.resolve_symbol(&args.symbol)?;

    let now = chrono::Utc::now().timestamp();
    let period = PeriodParams {
        from: now - args.history_minutes.max(0) * 60,
        to: now,
        first_data_request: true,
    };
    match feed.get_bars(&symbol_info, &args.resolution, period).await {
        Ok(outcome) if outcome.no_data => info!("No history in range"),
        Ok(outcome) => {
            if let Some(last) = outcome.bars.last() {
                info!(
                    count = outcome.bars.len(),
                    last_time = last.time,
                    last_close = last.close,
                    "History loaded"
                );
            }
        }
        Err(e) => error!(error = %e, "History request failed"),
    }

    let symbol = symbol_info.full_name.clone();
    feed.subscribe_bars(
        &symbol_info,
        &args.resolution,
        move |bar| {
            info!(
                %symbol,
                time = bar.time,
                open = bar.open,
                high = bar.high,
                low = bar.low,
                close = bar.close,
                volume = bar.volume,
                "Bar"
            );
        },
        SUBSCRIBER_ID,
        || warn!("Chart cache reset requested"),
    );

    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, shutting down");

    feed.unsubscribe_bars(SUBSCRIBER_ID);
    feed.dispose().await;

    match Metrics::gather_text() {
        Ok(text) => debug!(metrics = %text, "Final metrics"),
        Err(e) => warn!(error = %e, "Failed to render metrics"),
    }

    Ok(())
}

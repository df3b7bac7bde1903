//! Single-consumer event loop.
//!
//! All socket tasks send into one channel. This loop drains it and applies
//! each event to the registry under its lock, so bars for a subscription are
//! handled strictly in arrival order and never concurrently with
//! open/close on the same registry.

use crate::registry::SubscriptionRegistry;
use chartfeed_ws::StreamEvent;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Registry shared between the adapter and the dispatch loop.
pub type SharedRegistry = Arc<Mutex<SubscriptionRegistry>>;

/// Drain `events` into `registry` until `shutdown` fires or every sender is
/// gone.
pub async fn run_dispatch(
    registry: SharedRegistry,
    mut events: mpsc::Receiver<StreamEvent>,
    shutdown: CancellationToken,
) {
    info!("Dispatch loop started");

    loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                debug!("Dispatch loop shutdown requested");
                break;
            }

            event = events.recv() => {
                match event {
                    Some(event) => {
                        registry.lock().dispatch(event);
                    }
                    None => {
                        debug!("All event senders dropped");
                        break;
                    }
                }
            }
        }
    }

    info!("Dispatch loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SubscriptionRequest;
    use chartfeed_core::{Bar, Resolution};
    use chartfeed_ws::{KlineUpdate, MockStreamConnector, StreamEventKind};
    use std::time::Duration;

    #[tokio::test]
    async fn test_loop_delivers_and_stops() {
        let connector = Arc::new(MockStreamConnector::new());
        let (tx, rx) = mpsc::channel(16);
        let registry: SharedRegistry = Arc::new(Mutex::new(SubscriptionRegistry::new(
            connector.clone(),
            tx,
            "wss://example.invalid",
        )));

        let (bar_tx, mut bar_rx) = mpsc::unbounded_channel();
        registry.lock().open(SubscriptionRequest {
            subscriber_id: "s1".to_string(),
            symbol: "ETH/USDT".to_string(),
            resolution: Resolution::Min1,
            on_bar: Box::new(move |bar| {
                let _ = bar_tx.send(bar);
            }),
            on_reset: Box::new(|| {}),
            seed: None,
        });

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(run_dispatch(registry.clone(), rx, shutdown.clone()));

        let socket = connector.last().unwrap();
        let bar = Bar::new(60_000, 1.0, 2.0, 0.5, 1.5, 3.0);
        assert!(
            socket
                .send(StreamEventKind::Kline(KlineUpdate {
                    bar,
                    is_closed: true
                }))
                .await
        );

        let got = tokio::time::timeout(Duration::from_secs(2), bar_rx.recv())
            .await
            .unwrap();
        assert_eq!(got, Some(bar));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}

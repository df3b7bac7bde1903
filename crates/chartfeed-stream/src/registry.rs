//! Subscription registry.
//!
//! Owns every live chart subscription: its socket handle, callbacks, ordering
//! guard and aggregation state. Socket events are applied through
//! [`SubscriptionRegistry::dispatch`], which is expected to run on a single
//! consumer (see [`crate::dispatch`]).
//!
//! Callbacks run while the registry is borrowed mutably. They must not call
//! back into the registry.

use crate::aggregator::Aggregator;
use crate::guard::OrderingGuard;
use chartfeed_core::{to_exchange_symbol, Bar, CandlePolicy, ExchangeSymbol, Resolution};
use chartfeed_telemetry::Metrics;
use chartfeed_ws::{
    stream_url, ConnectionId, KlineUpdate, StreamConnector, StreamEvent, StreamEventKind,
    StreamHandle, StreamRequest,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Realtime bar callback.
pub type BarCallback = Box<dyn FnMut(Bar) + Send>;
/// Invoked when the chart should drop its cached history.
pub type ResetCallback = Box<dyn FnMut() + Send>;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_connection_id() -> ConnectionId {
    NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Everything needed to open a subscription.
pub struct SubscriptionRequest {
    pub subscriber_id: String,
    /// Chart symbol, e.g. `BTC/USDT`.
    pub symbol: String,
    pub resolution: Resolution,
    pub on_bar: BarCallback,
    pub on_reset: ResetCallback,
    /// Last historical bar, used as the ordering baseline.
    pub seed: Option<Bar>,
}

/// Socket state as last reported by the socket task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Connecting,
    Open,
    /// Closed or failed. The entry stays inert until unsubscribed.
    Down,
}

struct Subscription {
    symbol: String,
    exchange_symbol: ExchangeSymbol,
    resolution: Resolution,
    policy: CandlePolicy,
    on_bar: BarCallback,
    on_reset: ResetCallback,
    guard: OrderingGuard,
    aggregator: Option<Aggregator>,
    socket: StreamHandle,
    connection_id: ConnectionId,
    state: SocketState,
}

impl Subscription {
    fn on_kline(&mut self, subscriber_id: &str, update: KlineUpdate) {
        match self.policy {
            CandlePolicy::ClosedOnly => {
                if update.is_closed {
                    self.emit(subscriber_id, update.bar);
                }
            }
            CandlePolicy::LiveAggregate => {
                let flushed = self
                    .aggregator
                    .as_mut()
                    .and_then(|agg| agg.push(update.bar));
                if let Some(bar) = flushed {
                    self.emit(subscriber_id, bar);
                }
            }
        }
    }

    /// Every bar headed for the callback passes the guard here.
    fn emit(&mut self, subscriber_id: &str, bar: Bar) {
        if let Err(e) = self.guard.check(&bar) {
            warn!(
                %subscriber_id,
                symbol = %self.symbol,
                resolution = %self.resolution,
                error = %e,
                "Dropping out-of-order bar"
            );
            Metrics::order_violation(self.resolution.code());
            return;
        }

        debug!(%subscriber_id, time = bar.time, close = bar.close, "Emitting bar");
        (self.on_bar)(bar);
        self.guard.record(bar);
        Metrics::bar_emitted(self.resolution.code());
    }
}

/// Registry of live subscriptions.
pub struct SubscriptionRegistry {
    connector: Arc<dyn StreamConnector>,
    events: mpsc::Sender<StreamEvent>,
    ws_base_url: String,
    subscriptions: HashMap<String, Subscription>,
}

impl SubscriptionRegistry {
    /// `events` is the sender half of the channel drained by the dispatch
    /// loop; every socket opened by this registry reports there.
    pub fn new(
        connector: Arc<dyn StreamConnector>,
        events: mpsc::Sender<StreamEvent>,
        ws_base_url: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            events,
            ws_base_url: ws_base_url.into(),
            subscriptions: HashMap::new(),
        }
    }

    /// Open a subscription and its socket.
    ///
    /// An existing entry for the same id is replaced: its socket is closed
    /// first, then the new entry takes its place.
    pub fn open(&mut self, request: SubscriptionRequest) {
        let SubscriptionRequest {
            subscriber_id,
            symbol,
            resolution,
            on_bar,
            on_reset,
            seed,
        } = request;

        if let Some(previous) = self.subscriptions.remove(&subscriber_id) {
            warn!(
                %subscriber_id,
                previous_symbol = %previous.symbol,
                "Subscriber already active, replacing"
            );
            previous.socket.close();
        } else {
            Metrics::subscription_opened();
        }

        let exchange_symbol = to_exchange_symbol(&symbol);
        let connection_id = next_connection_id();
        let url = stream_url(&self.ws_base_url, &exchange_symbol, resolution.interval());

        info!(
            %subscriber_id,
            %symbol,
            %exchange_symbol,
            %resolution,
            connection_id,
            "Opening subscription"
        );

        let socket = self.connector.connect(
            StreamRequest {
                subscriber_id: subscriber_id.clone(),
                connection_id,
                url,
            },
            self.events.clone(),
        );

        self.subscriptions.insert(
            subscriber_id,
            Subscription {
                symbol,
                exchange_symbol,
                resolution,
                policy: resolution.candle_policy(),
                on_bar,
                on_reset,
                guard: OrderingGuard::new(seed),
                aggregator: Aggregator::for_resolution(resolution),
                socket,
                connection_id,
                state: SocketState::Connecting,
            },
        );
    }

    /// Close a subscription. The socket is closed before the entry is
    /// removed. Unknown ids are a no-op. Returns whether an entry existed.
    pub fn close(&mut self, subscriber_id: &str) -> bool {
        let Some(subscription) = self.subscriptions.get(subscriber_id) else {
            debug!(%subscriber_id, "No active subscription to close");
            return false;
        };
        subscription.socket.close();

        if let Some(removed) = self.subscriptions.remove(subscriber_id) {
            if let Some(pending) = removed.aggregator.as_ref().and_then(|a| a.pending()) {
                debug!(
                    %subscriber_id,
                    bucket_start = pending.start,
                    bars = pending.bars().len(),
                    "Discarding partial bucket"
                );
            }
        }
        Metrics::subscription_closed();
        info!(%subscriber_id, "Subscription closed");
        true
    }

    /// Close every subscription.
    pub fn close_all(&mut self) {
        let ids: Vec<String> = self.subscriptions.keys().cloned().collect();
        for id in ids {
            self.close(&id);
        }
    }

    /// Invoke the stored reset callback. Returns false for unknown ids.
    pub fn reset_cache(&mut self, subscriber_id: &str) -> bool {
        match self.subscriptions.get_mut(subscriber_id) {
            Some(subscription) => {
                info!(%subscriber_id, "Resetting chart cache");
                (subscription.on_reset)();
                true
            }
            None => {
                debug!(%subscriber_id, "Reset requested for unknown subscriber");
                false
            }
        }
    }

    /// Apply one socket event.
    ///
    /// Events for unknown ids, or from a socket other than the entry's
    /// current one, are dropped.
    pub fn dispatch(&mut self, event: StreamEvent) {
        let StreamEvent {
            subscriber_id,
            connection_id,
            kind,
        } = event;

        let Some(subscription) = self.subscriptions.get_mut(&subscriber_id) else {
            debug!(%subscriber_id, "Dropping event for inactive subscriber");
            return;
        };
        if subscription.connection_id != connection_id {
            debug!(
                %subscriber_id,
                connection_id,
                current = subscription.connection_id,
                "Dropping event from stale socket"
            );
            return;
        }

        match kind {
            StreamEventKind::Opened => {
                subscription.state = SocketState::Open;
                Metrics::socket_event("connected");
                info!(%subscriber_id, symbol = %subscription.exchange_symbol, "Stream open");
            }
            StreamEventKind::Kline(update) => {
                if subscription.state == SocketState::Down {
                    return;
                }
                subscription.on_kline(&subscriber_id, update);
            }
            StreamEventKind::Closed { code, reason } => {
                subscription.state = SocketState::Down;
                Metrics::socket_event("closed");
                warn!(%subscriber_id, code, %reason, "Stream closed, subscription inert");
            }
            StreamEventKind::Failed(reason) => {
                subscription.state = SocketState::Down;
                Metrics::socket_event("failed");
                error!(%subscriber_id, %reason, "Stream failed, subscription inert");
            }
        }
    }

    pub fn contains(&self, subscriber_id: &str) -> bool {
        self.subscriptions.contains_key(subscriber_id)
    }

    pub fn socket_state(&self, subscriber_id: &str) -> Option<SocketState> {
        self.subscriptions.get(subscriber_id).map(|s| s.state)
    }

    /// Last bar emitted (or seeded) for a subscriber.
    pub fn last_emitted(&self, subscriber_id: &str) -> Option<Bar> {
        self.subscriptions
            .get(subscriber_id)
            .and_then(|s| s.guard.last().copied())
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl Drop for SubscriptionRegistry {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartfeed_ws::{MockSocket, MockStreamConnector};
    use parking_lot::Mutex;

    struct Fixture {
        registry: SubscriptionRegistry,
        connector: Arc<MockStreamConnector>,
        _events: mpsc::Receiver<StreamEvent>,
    }

    fn fixture() -> Fixture {
        let connector = Arc::new(MockStreamConnector::new());
        let (tx, rx) = mpsc::channel(64);
        let registry = SubscriptionRegistry::new(
            connector.clone(),
            tx,
            "wss://stream.binance.com:9443",
        );
        Fixture {
            registry,
            connector,
            _events: rx,
        }
    }

    fn request(
        id: &str,
        resolution: Resolution,
        seed: Option<Bar>,
    ) -> (SubscriptionRequest, Arc<Mutex<Vec<Bar>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let req = SubscriptionRequest {
            subscriber_id: id.to_string(),
            symbol: "BTC/USDT".to_string(),
            resolution,
            on_bar: Box::new(move |bar| sink.lock().push(bar)),
            on_reset: Box::new(|| {}),
            seed,
        };
        (req, received)
    }

    fn kline(socket: &MockSocket, time: i64, close: f64, is_closed: bool) -> StreamEvent {
        socket.event(StreamEventKind::Kline(KlineUpdate {
            bar: Bar::new(time, 1.0, close.max(1.0), 0.5, close, 1.0),
            is_closed,
        }))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[test]
    fn test_open_connects_with_translated_endpoint() {
        let mut f = fixture();
        let (req, _) = request("s1", Resolution::Min1, None);
        f.registry.open(req);

        let socket = f.connector.last().unwrap();
        assert_eq!(
            socket.request.url,
            "wss://stream.binance.com:9443/ws/btcusdt@kline_1m"
        );
        assert_eq!(socket.request.subscriber_id, "s1");
        assert_eq!(f.registry.socket_state("s1"), Some(SocketState::Connecting));
        assert_eq!(f.registry.len(), 1);
    }

    #[test]
    fn test_synthetic_resolution_streams_one_second() {
        let mut f = fixture();
        let (req, _) = request("s1", Resolution::Sec5, None);
        f.registry.open(req);
        assert!(f.connector.last().unwrap().request.url.ends_with("@kline_1s"));
    }

    #[test]
    fn test_close_closes_socket_and_removes_entry() {
        let mut f = fixture();
        let (req, received) = request("s1", Resolution::Min1, None);
        f.registry.open(req);
        let socket = f.connector.last().unwrap();

        assert!(f.registry.close("s1"));
        assert!(socket.is_closed());
        assert!(!f.registry.contains("s1"));

        // Late frames from the closed socket never reach the callback.
        f.registry.dispatch(kline(&socket, 60_000, 2.0, true));
        assert!(received.lock().is_empty());

        // Idempotent.
        assert!(!f.registry.close("s1"));
    }

    #[test]
    fn test_duplicate_open_replaces_and_closes_previous() {
        let mut f = fixture();
        let (first, first_rx) = request("s1", Resolution::Min1, None);
        f.registry.open(first);
        let old = f.connector.last().unwrap();

        let (second, second_rx) = request("s1", Resolution::Min5, None);
        f.registry.open(second);
        let new = f.connector.last().unwrap();

        assert!(old.is_closed());
        assert!(!new.is_closed());
        assert_eq!(f.registry.len(), 1);
        assert_ne!(old.request.connection_id, new.request.connection_id);

        // Old socket's frames are stale; the new one's are delivered.
        f.registry.dispatch(kline(&old, 60_000, 2.0, true));
        f.registry.dispatch(kline(&new, 300_000, 3.0, true));
        assert!(first_rx.lock().is_empty());
        assert_eq!(second_rx.lock().len(), 1);
    }

    #[test]
    fn test_drop_cancels_sockets() {
        let mut f = fixture();
        let (a, _) = request("a", Resolution::Min1, None);
        let (b, _) = request("b", Resolution::Sec10, None);
        f.registry.open(a);
        f.registry.open(b);
        let sockets = f.connector.sockets();

        drop(f.registry);
        assert!(sockets.iter().all(|s| s.is_closed()));
    }

    // ========================================================================
    // Routing
    // ========================================================================

    #[test]
    fn test_closed_only_forwards_final_candles() {
        let mut f = fixture();
        let (req, received) = request("s1", Resolution::Min1, None);
        f.registry.open(req);
        let socket = f.connector.last().unwrap();

        f.registry.dispatch(socket.event(StreamEventKind::Opened));
        f.registry.dispatch(kline(&socket, 60_000, 2.0, false));
        f.registry.dispatch(kline(&socket, 60_000, 2.5, false));
        assert!(received.lock().is_empty());

        f.registry.dispatch(kline(&socket, 60_000, 3.0, true));
        let got = received.lock().clone();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].close, 3.0);
        assert_eq!(f.registry.last_emitted("s1").map(|b| b.time), Some(60_000));
    }

    #[test]
    fn test_live_aggregate_emits_on_bucket_boundary() {
        let mut f = fixture();
        let (req, received) = request("s1", Resolution::Sec5, None);
        f.registry.open(req);
        let socket = f.connector.last().unwrap();

        let update = |t: i64, o: f64, h: f64, l: f64, c: f64, v: f64, x: bool| {
            socket.event(StreamEventKind::Kline(KlineUpdate {
                bar: Bar::new(t, o, h, l, c, v),
                is_closed: x,
            }))
        };

        // Partial updates are aggregated too; the open flag does not matter.
        f.registry.dispatch(update(0, 1.0, 2.0, 0.5, 1.5, 10.0, false));
        f.registry.dispatch(update(1_000, 1.5, 3.0, 1.0, 2.0, 5.0, true));
        assert!(received.lock().is_empty());

        f.registry.dispatch(update(5_000, 2.0, 2.0, 2.0, 2.0, 1.0, false));
        assert_eq!(
            received.lock().clone(),
            vec![Bar::new(0, 1.0, 3.0, 0.5, 2.0, 15.0)]
        );
    }

    #[test]
    fn test_seeded_guard_rejects_stale_bars() {
        let mut f = fixture();
        let seed = Bar::new(120_000, 1.0, 1.0, 1.0, 1.0, 1.0);
        let (req, received) = request("s1", Resolution::Min1, Some(seed));
        f.registry.open(req);
        let socket = f.connector.last().unwrap();

        f.registry.dispatch(kline(&socket, 60_000, 2.0, true));
        f.registry.dispatch(kline(&socket, 120_000, 2.0, true));
        assert!(received.lock().is_empty());

        f.registry.dispatch(kline(&socket, 180_000, 2.0, true));
        assert_eq!(received.lock().len(), 1);
    }

    #[test]
    fn test_synthetic_bars_pass_the_guard() {
        let mut f = fixture();
        // Seed ahead of the first synthetic bucket.
        let seed = Bar::new(5_000, 1.0, 1.0, 1.0, 1.0, 1.0);
        let (req, received) = request("s1", Resolution::Sec5, Some(seed));
        f.registry.open(req);
        let socket = f.connector.last().unwrap();

        f.registry.dispatch(kline(&socket, 0, 1.0, true));
        f.registry.dispatch(kline(&socket, 5_000, 1.0, true));
        // Bucket 0 flushed but rejected (0 <= 5000).
        assert!(received.lock().is_empty());

        f.registry.dispatch(kline(&socket, 10_000, 1.0, true));
        // Bucket 5000 flushed, still not after the seed.
        assert!(received.lock().is_empty());

        f.registry.dispatch(kline(&socket, 15_000, 1.0, true));
        assert_eq!(received.lock().len(), 1);
        assert_eq!(received.lock()[0].time, 10_000);
    }

    #[test]
    fn test_failed_socket_leaves_entry_inert() {
        let mut f = fixture();
        let (req, received) = request("s1", Resolution::Min1, None);
        f.registry.open(req);
        let socket = f.connector.last().unwrap();

        f.registry
            .dispatch(socket.event(StreamEventKind::Failed("connection refused".to_string())));
        assert_eq!(f.registry.socket_state("s1"), Some(SocketState::Down));
        assert!(f.registry.contains("s1"));

        f.registry.dispatch(kline(&socket, 60_000, 2.0, true));
        assert!(received.lock().is_empty());

        assert!(f.registry.close("s1"));
    }

    #[test]
    fn test_reset_cache_invokes_callback() {
        let mut f = fixture();
        let resets = Arc::new(Mutex::new(0u32));
        let counter = resets.clone();
        let (mut req, _) = request("s1", Resolution::Min1, None);
        req.on_reset = Box::new(move || *counter.lock() += 1);
        f.registry.open(req);

        assert!(f.registry.reset_cache("s1"));
        assert!(!f.registry.reset_cache("nobody"));
        assert_eq!(*resets.lock(), 1);
    }
}

//! Per-subscription kline socket.
//!
//! Each chart subscription owns one socket task. The task connects, decodes
//! frames and forwards [`StreamEvent`]s to a single consumer. It exits on
//! cancellation, server close, read error or end of stream, and never
//! reconnects.

use crate::error::{WsError, WsResult};
use crate::message::{decode_frame, KlineUpdate, StreamMessage};
use chartfeed_core::{ExchangeInterval, ExchangeSymbol};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Process-unique identity of one opened socket.
pub type ConnectionId = u64;

/// Build the kline stream endpoint, e.g.
/// `wss://stream.binance.com:9443/ws/btcusdt@kline_1m`.
pub fn stream_url(ws_base_url: &str, symbol: &ExchangeSymbol, interval: ExchangeInterval) -> String {
    format!(
        "{}/ws/{}@kline_{}",
        ws_base_url.trim_end_matches('/'),
        symbol.stream_name(),
        interval
    )
}

/// What to connect and how to tag its events.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    pub subscriber_id: String,
    pub connection_id: ConnectionId,
    pub url: String,
}

/// Event emitted by a socket task.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub subscriber_id: String,
    pub connection_id: ConnectionId,
    pub kind: StreamEventKind,
}

#[derive(Debug, Clone)]
pub enum StreamEventKind {
    /// Handshake completed.
    Opened,
    /// Decoded candle update. Closed-state filtering is left to the consumer.
    Kline(KlineUpdate),
    /// Server closed the socket or the stream ended.
    Closed { code: u16, reason: String },
    /// Connect or read failure.
    Failed(String),
}

/// Owned handle to a socket task.
///
/// Closing (or dropping) the handle cancels the task, which sends a Close
/// frame if the socket is up.
#[derive(Debug)]
pub struct StreamHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl StreamHandle {
    pub fn new(cancel: CancellationToken, task: Option<JoinHandle<()>>) -> Self {
        Self { cancel, task }
    }

    /// Handle with no task behind it. Used by connectors that drive events
    /// some other way (tests, replay).
    pub fn detached(cancel: CancellationToken) -> Self {
        Self { cancel, task: None }
    }

    /// Request the socket to close. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Close and wait for the socket task to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(?e, "Stream task ended abnormally");
            }
        }
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Opens sockets on behalf of the subscription registry.
pub trait StreamConnector: Send + Sync {
    /// Start a socket for `request`. Events go to `events`; the returned
    /// handle controls the socket's lifetime.
    fn connect(&self, request: StreamRequest, events: mpsc::Sender<StreamEvent>) -> StreamHandle;
}

/// Real connector: one tokio task per socket.
///
/// Must be called from within a tokio runtime.
#[derive(Debug, Default, Clone)]
pub struct WsStreamConnector;

impl WsStreamConnector {
    pub fn new() -> Self {
        Self
    }
}

impl StreamConnector for WsStreamConnector {
    fn connect(&self, request: StreamRequest, events: mpsc::Sender<StreamEvent>) -> StreamHandle {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_socket(request, events, cancel.clone()));
        StreamHandle::new(cancel, Some(task))
    }
}

enum Exit {
    Cancelled,
    Ended,
}

struct EventSink {
    request: StreamRequest,
    events: mpsc::Sender<StreamEvent>,
}

impl EventSink {
    /// Returns false once the consumer is gone.
    async fn emit(&self, kind: StreamEventKind) -> bool {
        let event = StreamEvent {
            subscriber_id: self.request.subscriber_id.clone(),
            connection_id: self.request.connection_id,
            kind,
        };
        if self.events.send(event).await.is_err() {
            debug!(
                subscriber_id = %self.request.subscriber_id,
                "Event receiver dropped"
            );
            return false;
        }
        true
    }
}

async fn run_socket(
    request: StreamRequest,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let sink = EventSink { request, events };

    match pump(&sink, &cancel).await {
        Ok(Exit::Cancelled) => {
            debug!(subscriber_id = %sink.request.subscriber_id, "Stream cancelled");
        }
        Ok(Exit::Ended) => {
            warn!(subscriber_id = %sink.request.subscriber_id, "Stream ended");
            sink.emit(StreamEventKind::Closed {
                code: 1006,
                reason: "stream ended".to_string(),
            })
            .await;
        }
        Err(WsError::ConnectionClosed { code, reason }) => {
            sink.emit(StreamEventKind::Closed { code, reason }).await;
        }
        Err(e) => {
            if !cancel.is_cancelled() {
                sink.emit(StreamEventKind::Failed(e.to_string())).await;
            }
        }
    }
}

async fn pump(sink: &EventSink, cancel: &CancellationToken) -> WsResult<Exit> {
    let url = &sink.request.url;
    let subscriber_id = &sink.request.subscriber_id;
    info!(%url, %subscriber_id, "Connecting kline stream");

    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(Exit::Cancelled),
        res = connect_async_tls_with_config(url.as_str(), None, true, None) => res,
    };
    let (ws_stream, _response) = connected.map_err(|e| {
        error!(%url, %subscriber_id, error = %e, "Kline stream connect failed");
        WsError::from(e)
    })?;
    let (mut write, mut read) = ws_stream.split();

    info!(%subscriber_id, "Kline stream connected");
    if !sink.emit(StreamEventKind::Opened).await {
        let _ = write.send(Message::Close(None)).await;
        return Ok(Exit::Cancelled);
    }

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    warn!(?e, %subscriber_id, "Failed to send Close frame");
                }
                info!(%subscriber_id, "Kline stream closed by client");
                return Ok(Exit::Cancelled);
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match decode_frame(&text) {
                            Ok(StreamMessage::Kline(update)) => {
                                if !sink.emit(StreamEventKind::Kline(update)).await {
                                    return Ok(Exit::Cancelled);
                                }
                            }
                            Ok(StreamMessage::Unrecognized) => {
                                debug!(%subscriber_id, "Ignoring non-kline frame");
                            }
                            Err(e) => {
                                warn!(%subscriber_id, error = %e, "Dropping malformed frame");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        write.send(Message::Pong(data)).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((1000, "Normal close".to_string()));
                        warn!(code, %reason, %subscriber_id, "Kline stream closed by server");
                        return Err(WsError::ConnectionClosed { code, reason });
                    }
                    Some(Err(e)) => {
                        error!(?e, %subscriber_id, "Kline stream read error");
                        return Err(e.into());
                    }
                    None => return Ok(Exit::Ended),
                    _ => {}
                }
            }
        }
    }
}

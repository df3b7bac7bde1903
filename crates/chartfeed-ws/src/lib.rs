//! Kline WebSocket streams for the chart datafeed.
//!
//! One socket per chart subscription:
//! - Endpoint construction from exchange symbol and interval
//! - Tagged decoding of inbound frames (kline vs. everything else)
//! - A spawned socket task per subscription, cancelled through its handle
//! - Lifecycle and kline events routed over an mpsc channel
//!
//! No reconnection is attempted. A socket that closes or fails stays down
//! until the caller opens a new one.

pub mod connection;
pub mod error;
pub mod message;
pub mod mock;

pub use connection::{
    stream_url, ConnectionId, StreamConnector, StreamEvent, StreamEventKind, StreamHandle,
    StreamRequest, WsStreamConnector,
};
pub use error::{WsError, WsResult};
pub use message::{decode_frame, KlineUpdate, StreamMessage};
pub use mock::{MockSocket, MockStreamConnector};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Install the ring TLS crypto provider.
/// Call once before the first `wss://` connection.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

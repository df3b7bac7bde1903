//! In-process connector for tests and replay.
//!
//! Records every connect request and hands back a handle with no socket
//! behind it. Events are injected through the recorded [`MockSocket`]s.

use crate::connection::{StreamConnector, StreamEvent, StreamEventKind, StreamHandle, StreamRequest};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One recorded connect call.
#[derive(Debug, Clone)]
pub struct MockSocket {
    pub request: StreamRequest,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
}

impl MockSocket {
    /// Push an event as if it came from this socket. Returns false if the
    /// consumer is gone.
    pub async fn send(&self, kind: StreamEventKind) -> bool {
        self.events.send(self.event(kind)).await.is_ok()
    }

    /// Non-async variant of [`MockSocket::send`].
    pub fn try_send(&self, kind: StreamEventKind) -> bool {
        self.events.try_send(self.event(kind)).is_ok()
    }

    /// Build the event without sending it.
    pub fn event(&self, kind: StreamEventKind) -> StreamEvent {
        StreamEvent {
            subscriber_id: self.request.subscriber_id.clone(),
            connection_id: self.request.connection_id,
            kind,
        }
    }

    /// Whether the owner closed or dropped the handle.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Mock stream connector.
#[derive(Debug, Default)]
pub struct MockStreamConnector {
    sockets: parking_lot::Mutex<Vec<MockSocket>>,
}

impl MockStreamConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every socket opened so far, oldest first.
    pub fn sockets(&self) -> Vec<MockSocket> {
        self.sockets.lock().clone()
    }

    /// Most recently opened socket.
    pub fn last(&self) -> Option<MockSocket> {
        self.sockets.lock().last().cloned()
    }

    pub fn connect_count(&self) -> usize {
        self.sockets.lock().len()
    }
}

impl StreamConnector for MockStreamConnector {
    fn connect(&self, request: StreamRequest, events: mpsc::Sender<StreamEvent>) -> StreamHandle {
        let cancel = CancellationToken::new();
        self.sockets.lock().push(MockSocket {
            request,
            events,
            cancel: cancel.clone(),
        });
        StreamHandle::detached(cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_and_injects() {
        let connector = MockStreamConnector::new();
        let (tx, mut rx) = mpsc::channel(4);
        let handle = connector.connect(
            StreamRequest {
                subscriber_id: "a".to_string(),
                connection_id: 1,
                url: "ws://mock".to_string(),
            },
            tx,
        );

        let socket = connector.last().unwrap();
        assert_eq!(connector.connect_count(), 1);
        assert!(socket.send(StreamEventKind::Opened).await);

        let event = rx.recv().await.unwrap();
        assert_eq!(event.subscriber_id, "a");
        assert!(matches!(event.kind, StreamEventKind::Opened));

        assert!(!socket.is_closed());
        handle.close();
        assert!(socket.is_closed());
    }
}

//! WebSocket connection to the analysis backend.
//!
//! A [`Connection`] is a pair of channels fed by two I/O tasks: a reader that
//! turns socket frames into [`InboundEvent`]s and a writer that drains queued
//! outbound text. The tasks never touch session state; the owner pulls events
//! with [`Connection::recv`] and can detach inbound delivery synchronously.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{BoardError, Result};
use crate::protocol::ClientEnvelope;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one opened connection; tags every inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Everything the transport can report to the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Frame { conn: ConnectionId, text: String },
    Closed { conn: ConnectionId, reason: Option<String> },
    TransportError { conn: ConnectionId, message: String },
}

impl InboundEvent {
    pub fn connection(&self) -> ConnectionId {
        match self {
            InboundEvent::Frame { conn, .. }
            | InboundEvent::Closed { conn, .. }
            | InboundEvent::TransportError { conn, .. } => *conn,
        }
    }
}

/// An open, exclusively owned channel to the backend
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    url: String,
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: Option<mpsc::UnboundedReceiver<InboundEvent>>,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    fn new(
        id: ConnectionId,
        url: impl Into<String>,
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<InboundEvent>,
        reader: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            id,
            url: url.into(),
            outbound: Some(outbound),
            inbound: Some(inbound),
            reader,
        }
    }

    /// In-memory connection; the returned peer plays the backend
    pub fn channel_pair(url: impl Into<String>) -> (Connection, PeerHandle) {
        let id = ConnectionId::next();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = Connection::new(id, url, out_tx, in_rx, None);
        let peer = PeerHandle {
            id,
            events: in_tx,
            sent: out_rx,
        };
        (conn, peer)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_attached(&self) -> bool {
        self.inbound.is_some()
    }

    /// Queue an envelope. Fire-and-forget: delivery is not confirmed.
    pub fn send(&self, envelope: &ClientEnvelope) -> Result<()> {
        let text = envelope.to_json()?;
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| BoardError::TransportClosed("connection already closed".to_string()))?;
        outbound
            .send(text)
            .map_err(|_| BoardError::TransportClosed("writer task has stopped".to_string()))?;
        debug!("{} queued '{}'", self.id, envelope.action());
        Ok(())
    }

    /// Next inbound event; `None` once detached or the transport is gone
    pub async fn recv(&mut self) -> Option<InboundEvent> {
        match self.inbound.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Stop inbound delivery now. Events already queued are discarded.
    pub fn detach(&mut self) {
        if let Some(mut rx) = self.inbound.take() {
            rx.close();
            debug!("{} inbound detached", self.id);
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }

    /// Detach and release the writer, which sends a close frame after
    /// flushing anything already queued.
    pub fn close(mut self) {
        self.detach();
        self.outbound.take();
        info!("{} closed", self.id);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

/// Backend side of an in-memory connection
#[derive(Debug)]
pub struct PeerHandle {
    id: ConnectionId,
    events: mpsc::UnboundedSender<InboundEvent>,
    sent: mpsc::UnboundedReceiver<String>,
}

impl PeerHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Build a frame event for this connection without delivering it
    pub fn frame_event(&self, text: impl Into<String>) -> InboundEvent {
        InboundEvent::Frame {
            conn: self.id,
            text: text.into(),
        }
    }

    /// Deliver a frame; false once the client side has detached
    pub fn push_frame(&self, text: impl Into<String>) -> bool {
        self.events.send(self.frame_event(text)).is_ok()
    }

    pub fn push_close(&self, reason: Option<&str>) -> bool {
        self.events
            .send(InboundEvent::Closed {
                conn: self.id,
                reason: reason.map(str::to_string),
            })
            .is_ok()
    }

    pub fn push_error(&self, message: impl Into<String>) -> bool {
        self.events
            .send(InboundEvent::TransportError {
                conn: self.id,
                message: message.into(),
            })
            .is_ok()
    }

    /// Has the client side stopped listening?
    pub fn is_detached(&self) -> bool {
        self.events.is_closed()
    }

    /// Next text frame sent by the client, if one is queued
    pub fn try_next_sent(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }

    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }
}

/// Opens connections for the session controller
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, url: &str) -> Result<Connection>;
}

/// In-memory connector. Each opened connection's backend side is handed
/// out through the receiver returned by [`ChannelConnector::new`].
#[derive(Debug)]
pub struct ChannelConnector {
    peers: mpsc::UnboundedSender<PeerHandle>,
    refuse_with: Option<String>,
}

impl ChannelConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PeerHandle>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers: tx,
                refuse_with: None,
            },
            rx,
        )
    }

    /// Connector whose every open fails with the given reason
    pub fn refusing(reason: impl Into<String>) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel();
        Self {
            peers: tx,
            refuse_with: Some(reason.into()),
        }
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn open(&self, url: &str) -> Result<Connection> {
        if let Some(reason) = &self.refuse_with {
            return Err(BoardError::ConnectionOpen(format!("{}: {}", url, reason)));
        }
        let (conn, peer) = Connection::channel_pair(url);
        self.peers
            .send(peer)
            .map_err(|_| BoardError::ConnectionOpen(format!("{}: no peer listening", url)))?;
        Ok(conn)
    }
}

/// tokio-tungstenite backed connector
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    connect_timeout: Option<Duration>,
}

impl WsConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the handshake. Unset means wait for as long as it takes.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(timeout),
        }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, url: &str) -> Result<Connection> {
        let parsed = Url::parse(url)
            .map_err(|e| BoardError::ConnectionOpen(format!("Invalid WebSocket URL '{}': {}", url, e)))?;

        info!("Connecting to analysis backend: {}", parsed);

        let handshake = connect_async(parsed.as_str());
        let (ws_stream, _) = match self.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, handshake)
                .await
                .map_err(|_| BoardError::ConnectionOpen(format!("Connection to {} timed out", parsed)))?,
            None => handshake.await,
        }
        .map_err(|e| BoardError::ConnectionOpen(format!("{}: {}", parsed, e)))?;

        let id = ConnectionId::next();
        info!("{} connected to {}", id, parsed);

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<InboundEvent>();

        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if let Err(e) = write.send(Message::Text(text)).await {
                    warn!("{} failed to send frame: {}", id, e);
                    return;
                }
            }
            // Owner released the connection
            if let Err(e) = write.send(Message::Close(None)).await {
                debug!("{} close frame not sent: {}", id, e);
            }
        });

        let reader = tokio::spawn(async move {
            loop {
                let event = match read.next().await {
                    Some(Ok(Message::Text(text))) => InboundEvent::Frame { conn: id, text },
                    Some(Ok(Message::Close(frame))) => {
                        info!("{} received close frame", id);
                        let _ = in_tx.send(InboundEvent::Closed {
                            conn: id,
                            reason: frame.map(|f| f.reason.to_string()),
                        });
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        error!("{} transport error: {}", id, e);
                        let _ = in_tx.send(InboundEvent::TransportError {
                            conn: id,
                            message: e.to_string(),
                        });
                        break;
                    }
                    None => {
                        let _ = in_tx.send(InboundEvent::Closed {
                            conn: id,
                            reason: None,
                        });
                        break;
                    }
                };

                if in_tx.send(event).is_err() {
                    debug!("{} inbound detached, reader exiting", id);
                    break;
                }
            }
        });

        Ok(Connection::new(id, parsed.as_str(), out_tx, in_rx, Some(reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_pair_round_trip() {
        let (mut conn, mut peer) = Connection::channel_pair("ws://localhost:8000/ws");

        conn.send(&ClientEnvelope::Ping).unwrap();
        assert_eq!(peer.next_sent().await.unwrap(), r#"{"action":"ping"}"#);

        assert!(peer.push_frame(r#"{"type":"pong"}"#));
        let event = conn.recv().await.unwrap();
        assert_eq!(event.connection(), conn.id());
        assert_eq!(event, peer.frame_event(r#"{"type":"pong"}"#));
    }

    #[tokio::test]
    async fn test_detach_drops_queued_events() {
        let (mut conn, peer) = Connection::channel_pair("ws://localhost:8000/ws");
        assert!(peer.push_frame("queued before detach"));

        conn.detach();

        assert!(!conn.is_attached());
        assert!(conn.recv().await.is_none());
        assert!(peer.is_detached());
        assert!(!peer.push_frame("late"));
    }

    #[tokio::test]
    async fn test_close_flushes_queued_then_ends() {
        let (conn, mut peer) = Connection::channel_pair("ws://localhost:8000/ws");
        conn.send(&ClientEnvelope::StopAnalysis).unwrap();
        conn.close();

        assert_eq!(peer.next_sent().await.unwrap(), r#"{"action":"stop_analysis"}"#);
        assert!(peer.next_sent().await.is_none());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let (a, _pa) = Connection::channel_pair("ws://a");
        let (b, _pb) = Connection::channel_pair("ws://b");
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_ws_connector_rejects_bad_url() {
        let err = WsConnector::new().open("not a url").await.unwrap_err();
        assert!(matches!(err, BoardError::ConnectionOpen(_)));
    }

    #[tokio::test]
    async fn test_channel_connector_hands_out_peers() {
        let (connector, mut peers) = ChannelConnector::new();
        let conn = connector.open("ws://localhost:8000/ws").await.unwrap();
        let peer = peers.recv().await.unwrap();
        assert_eq!(peer.id(), conn.id());

        let refused = ChannelConnector::refusing("connection refused")
            .open("ws://localhost:8000/ws")
            .await
            .unwrap_err();
        assert!(refused.to_string().contains("connection refused"));
    }
}

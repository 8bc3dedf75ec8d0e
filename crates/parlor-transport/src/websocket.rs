//! Browser-facing transport over `tokio-tungstenite`.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

use crate::{Connection, ConnectionId, Transport, TransportError, Upgrade};

/// Largest frame accepted from a client. Chat lines are short; SDP offers
/// with many candidates are the biggest legitimate payload.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

type WsStream = WebSocketStream<TcpStream>;

/// Listens for WebSocket upgrades on a TCP socket.
pub struct WebSocketTransport {
    listener: TcpListener,
    max_frame_bytes: usize,
}

impl WebSocketTransport {
    /// Binds with [`DEFAULT_MAX_FRAME_BYTES`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with_limit(addr, DEFAULT_MAX_FRAME_BYTES).await
    }

    /// Binds with a custom inbound frame limit.
    pub async fn bind_with_limit(addr: &str, max_frame_bytes: usize) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, max_frame_bytes, "listening for websocket clients");
        Ok(Self {
            listener,
            max_frame_bytes,
        })
    }

    fn ws_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = Some(self.max_frame_bytes);
        config.max_frame_size = Some(self.max_frame_bytes);
        config
    }
}

impl Transport for WebSocketTransport {
    type Upgrade = WebSocketUpgrade;
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Upgrade, Self::Error> {
        let (tcp, peer_addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %peer_addr, "tcp client accepted");

        Ok(WebSocketUpgrade {
            id,
            peer_addr,
            tcp,
            config: self.ws_config(),
            max_frame_bytes: self.max_frame_bytes,
        })
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

/// A TCP client that has not sent its WebSocket upgrade request yet.
pub struct WebSocketUpgrade {
    id: ConnectionId,
    peer_addr: SocketAddr,
    tcp: TcpStream,
    config: WebSocketConfig,
    max_frame_bytes: usize,
}

impl Upgrade for WebSocketUpgrade {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    async fn upgrade(self) -> Result<Self::Connection, Self::Error> {
        let Self {
            id,
            peer_addr,
            tcp,
            config,
            max_frame_bytes,
        } = self;

        let ws = tokio_tungstenite::accept_async_with_config(tcp, Some(config))
            .await
            .map_err(|e| {
                tracing::debug!(%id, %peer_addr, error = %e, "websocket upgrade failed");
                TransportError::AcceptFailed(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    e,
                ))
            })?;
        tracing::debug!(%id, %peer_addr, "websocket client connected");

        let (sink, stream) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer_addr,
            max_frame_bytes,
            sink: Mutex::new(sink),
            stream: Mutex::new(stream),
        })
    }
}

/// One upgraded client socket.
///
/// Read and write halves sit behind separate locks, so a reader parked in
/// [`Connection::recv`] never holds up outbound frames.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    max_frame_bytes: usize,
    sink: Mutex<SplitSink<WsStream, Message>>,
    stream: Mutex<SplitStream<WsStream>>,
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// UTF-8 payloads go out as text frames, since browsers hand JSON to
    /// `onmessage` as a string. Anything else is sent binary.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error> {
        let frame = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.sink
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| TransportError::from_ws(e, false, self.max_frame_bytes))
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        while let Some(frame) = stream.next().await {
            match frame.map_err(|e| TransportError::from_ws(e, true, self.max_frame_bytes))? {
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(_) => return Ok(None),
                // tungstenite answers pings itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
        Ok(None)
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sink
            .lock()
            .await
            .close()
            .await
            .map_err(|e| TransportError::from_ws(e, false, self.max_frame_bytes))
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

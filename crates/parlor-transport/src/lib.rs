//! Socket layer for Parlor.
//!
//! The server is written against three small traits: a [`Transport`]
//! hands out freshly accepted sockets, an [`Upgrade`] finishes the
//! protocol handshake on one of them, and each [`Connection`] moves opaque
//! frames in both directions. Everything above this crate names a socket by its
//! [`ConnectionId`] and nothing else.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — browser-facing transport over
//!   `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    DEFAULT_MAX_FRAME_BYTES, WebSocketConnection, WebSocketTransport, WebSocketUpgrade,
};

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Names one physical socket for its whole life.
///
/// Handed out by the transport at accept time from a process-wide
/// counter, so an id is never reused while the process runs. Browsers use
/// it as the `target` of signaling messages and see it as a bare number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Wraps a raw id. Transports should use [`ConnectionId::next`].
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh id.
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Source of new connections.
pub trait Transport: Send + Sync + 'static {
    type Upgrade: Upgrade<Connection = Self::Connection, Error = Self::Error>;
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Waits for the next client socket.
    ///
    /// Returns as soon as the socket is accepted; the handshake is left to
    /// [`Upgrade::upgrade`] so a client that never finishes it cannot hold
    /// up the accept loop. An error concerns that one client only; callers
    /// log it and keep accepting.
    async fn accept(&mut self) -> Result<Self::Upgrade, Self::Error>;

    /// Where the listener ended up, useful after binding port 0.
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

/// An accepted socket whose handshake has not run yet.
pub trait Upgrade: Send + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Id the connection will carry once upgraded.
    fn id(&self) -> ConnectionId;

    fn peer_addr(&self) -> SocketAddr;

    /// Runs the handshake. Callers bound it with a timeout.
    async fn upgrade(self) -> Result<Self::Connection, Self::Error>;
}

/// One accepted socket carrying encoded event frames.
///
/// `send` and `recv` may run at the same time from different tasks: a
/// handler parked on `recv` must never delay a broadcast going out.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Writes one frame.
    async fn send(&self, data: &[u8]) -> Result<(), Self::Error>;

    /// Reads the next data frame, skipping control frames. `Ok(None)`
    /// means the client closed the socket.
    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Starts a clean close.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;

    /// Remote address, for logs.
    fn peer_addr(&self) -> SocketAddr;
}

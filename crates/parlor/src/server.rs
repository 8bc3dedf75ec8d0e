//! `ParlorServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → session → room, with
//! the persistence worker off to the side.

use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{Codec, JsonCodec};
use parlor_room::{RoomConfig, RoomHandle, spawn_room};
use parlor_session::{Authenticator, PresenceRegistry};
use parlor_store::{DEFAULT_RECENT_TIMEOUT, MessageStore, spawn_worker};
use parlor_transport::{Transport, WebSocketTransport};

use crate::{ParlorError, ServerConfig};
use crate::handler::handle_connection;

/// The current protocol version. A `connect` carrying any other version
/// is rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Shared state handed to every connection task.
pub(crate) struct ServerState<A: Authenticator, C: Codec> {
    pub(crate) room: RoomHandle,
    pub(crate) registry: Arc<PresenceRegistry>,
    pub(crate) auth: A,
    pub(crate) codec: C,
    /// Budget for the WebSocket upgrade plus the `connect` event.
    pub(crate) handshake_timeout: Duration,
}

/// Builder for configuring and starting a Parlor server.
///
/// # Example
///
/// ```rust,no_run
/// use parlor::prelude::*;
///
/// # async fn start() -> Result<(), ParlorError> {
/// let server = ParlorServerBuilder::new()
///     .bind("0.0.0.0:5000")
///     .build(SharedSecretGate::new("hunter2"), InMemoryStore::new(500))
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ParlorServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    handshake_timeout: Duration,
    persist_queue: usize,
    history_timeout: Duration,
}

impl ParlorServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:5000".to_string(),
            room_config: RoomConfig::default(),
            handshake_timeout: Duration::from_secs(10),
            persist_queue: 256,
            history_timeout: DEFAULT_RECENT_TIMEOUT,
        }
    }

    /// Starts from environment-derived settings.
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new()
            .bind(&config.bind_address)
            .history_limit(config.history_limit)
            .handshake_timeout(config.handshake_timeout)
            .persist_queue(config.persist_queue)
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Replaces the room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// How many stored messages a joiner receives.
    pub fn history_limit(mut self, limit: usize) -> Self {
        self.room_config.history_limit = limit;
        self
    }

    /// How long a fresh socket may take to finish the WebSocket upgrade
    /// and send `connect`.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// How long a joiner waits for history before getting none.
    pub fn history_timeout(mut self, timeout: Duration) -> Self {
        self.history_timeout = timeout;
        self
    }

    /// Capacity of the persistence queue.
    pub fn persist_queue(mut self, capacity: usize) -> Self {
        self.persist_queue = capacity;
        self
    }

    /// Binds the listener and starts the room and persistence tasks.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A, S>(
        self,
        auth: A,
        store: S,
    ) -> Result<ParlorServer<A, JsonCodec>, ParlorError>
    where
        A: Authenticator,
        S: MessageStore,
    {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let registry = Arc::new(PresenceRegistry::new());
        let persistence =
            spawn_worker(store, self.persist_queue).with_recent_timeout(self.history_timeout);
        let room = spawn_room(self.room_config, Arc::clone(&registry), persistence);

        let state = Arc::new(ServerState {
            room,
            registry,
            auth,
            codec: JsonCodec,
            handshake_timeout: self.handshake_timeout,
        });

        Ok(ParlorServer { transport, state })
    }
}

impl Default for ParlorServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Parlor server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ParlorServer<A: Authenticator, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, C>>,
}

impl<A, C> ParlorServer<A, C>
where
    A: Authenticator,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Handle to the room actor.
    pub fn room(&self) -> RoomHandle {
        self.state.room.clone()
    }

    /// Shared presence registry.
    pub fn registry(&self) -> Arc<PresenceRegistry> {
        Arc::clone(&self.state.registry)
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// The WebSocket upgrade runs inside that task, so a client stuck
    /// mid-handshake only holds up itself. A failed accept is logged and
    /// the loop continues.
    pub async fn run(mut self) -> Result<(), ParlorError> {
        tracing::info!(
            addr = ?self.transport.local_addr().ok(),
            room = %self.state.room.name(),
            "parlor server running"
        );

        loop {
            match self.transport.accept().await {
                Ok(pending) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(pending, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}

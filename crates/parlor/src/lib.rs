//! # Parlor
//!
//! A single-room real-time chat with peer-to-peer call signaling.
//!
//! Browsers connect over WebSocket, present the room's shared secret and
//! a display name, and from then on exchange chat lines with everyone in
//! the room and WebRTC offers, answers and ICE candidates with specific
//! peers. Media never passes through the server.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parlor::prelude::*;
//!
//! # async fn start() -> Result<(), ParlorError> {
//! let config = ServerConfig::from_env()?;
//! let server = ParlorServerBuilder::from_config(&config)
//!     .build(SharedSecretGate::new(config.secret.clone()), InMemoryStore::new(500))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;

pub use config::{ConfigError, ServerConfig};
pub use error::ParlorError;
pub use server::{PROTOCOL_VERSION, ParlorServer, ParlorServerBuilder};

/// Everything needed to run a server, in one import.
pub mod prelude {
    pub use crate::{
        ConfigError, PROTOCOL_VERSION, ParlorError, ParlorServer, ParlorServerBuilder,
        ServerConfig,
    };
    pub use parlor_protocol::{
        ChatMessage, ClientEvent, Codec, ConnectionId, DisplayName, JsonCodec, PeerEntry,
        ServerEvent,
    };
    pub use parlor_room::{RoomConfig, RoomError, RoomHandle};
    pub use parlor_session::{Authenticator, SessionError, SharedSecretGate};
    pub use parlor_store::{InMemoryStore, JsonLinesStore, MessageStore, StoreError};
}

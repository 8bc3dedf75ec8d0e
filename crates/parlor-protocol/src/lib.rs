//! Wire protocol for Parlor.
//!
//! - **Types** ([`ClientEvent`], [`ServerEvent`], [`ChatMessage`],
//!   [`DisplayName`], ...) — what travels between browser and server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those events become
//!   frame bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (frames) → Protocol (events) → Session / Room
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use parlor_transport::ConnectionId;
pub use types::{
    ChatMessage, ClientEvent, DISPLAY_NAME_MAX_CHARS, DISPLAY_NAME_MIN_CHARS,
    DisplayName, InvalidDisplayName, PeerEntry, Recipient, ServerEvent,
};

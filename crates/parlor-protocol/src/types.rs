//! Event and value types that travel on the wire.
//!
//! Every frame is one JSON object of the form
//! `{"event": "<name>", "data": <payload>}`. Events without a payload
//! (`get_peers`, `disconnect`) omit `data`. Event names are snake_case so
//! they match what browser clients already emit.

use std::fmt;

use chrono::{DateTime, Utc};
use parlor_transport::ConnectionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// DisplayName
// ---------------------------------------------------------------------------

/// Shortest accepted display name, in characters.
pub const DISPLAY_NAME_MIN_CHARS: usize = 2;

/// Longest accepted display name, in characters.
pub const DISPLAY_NAME_MAX_CHARS: usize = 20;

/// A display name that failed length validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("display name must be 2-20 characters, got {chars}")]
pub struct InvalidDisplayName {
    /// Character count of the trimmed candidate.
    pub chars: usize,
}

/// The name a connection is shown under, fixed at admission.
///
/// Only [`DisplayName::parse`] builds one from untrusted input, so every
/// value in a registry has passed the length check. Comparison is exact
/// and case-sensitive: `"Alice"` and `"alice"` are different names.
///
/// Deserializing goes through the same check, so a name read back from
/// stored history or the wire is as valid as one typed at admission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Trims surrounding whitespace and checks the length is within
    /// 2–20 characters (Unicode scalar values, not bytes).
    pub fn parse(raw: &str) -> Result<Self, InvalidDisplayName> {
        let trimmed = raw.trim();
        let chars = trimmed.chars().count();
        if !(DISPLAY_NAME_MIN_CHARS..=DISPLAY_NAME_MAX_CHARS).contains(&chars) {
            return Err(InvalidDisplayName { chars });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = InvalidDisplayName;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// One accepted chat line.
///
/// Built by the room once the content passed validation; never edited
/// afterwards. The same value is broadcast live and handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who sent it.
    pub display_name: DisplayName,
    /// Trimmed content, 1–1000 characters.
    pub content: String,
    /// When the room accepted it (RFC 3339 on the wire).
    pub created_at: DateTime<Utc>,
}

/// One entry of a `peer_list` reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    /// The id to use as `target` in signaling events.
    pub connection_id: ConnectionId,
    /// The peer's display name.
    pub display_name: DisplayName,
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who a server event is delivered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recipient {
    /// Every connection currently in the room.
    Room,
    /// Exactly one connection.
    Connection(ConnectionId),
}

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Events a client sends.
///
/// Signaling payloads (`offer`, `answer`, `candidate`) are kept as raw
/// JSON and forwarded untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// First frame on every socket: protocol version, the room secret,
    /// and the requested display name.
    Connect {
        version: u32,
        token: String,
        display_name: String,
    },

    /// Leave the room and close the socket.
    Disconnect,

    /// Post a chat line to the room.
    SendMessage { content: String },

    /// Start a call negotiation with `target`.
    WebrtcOffer { target: ConnectionId, offer: Value },

    /// Answer an offer from `target`.
    WebrtcAnswer { target: ConnectionId, answer: Value },

    /// Trickle an ICE candidate to `target`.
    WebrtcIce { target: ConnectionId, candidate: Value },

    /// Ask for everyone else currently in the room.
    GetPeers,
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Admission succeeded. Sent to the new connection only.
    Welcome {
        connection_id: ConnectionId,
        display_name: DisplayName,
    },

    /// Admission failed; the socket is closed right after.
    /// `code` follows HTTP conventions (400 bad name, 401 bad secret,
    /// 409 name taken).
    Rejected { code: u16, reason: String },

    /// Recent stored messages, oldest first. Sent to a new connection
    /// before any live traffic.
    History { messages: Vec<ChatMessage> },

    /// Full roster in admission order.
    UserList(Vec<DisplayName>),

    /// Join/leave announcement.
    SystemMessage { text: String },

    /// A chat line accepted by the room.
    NewMessage(ChatMessage),

    /// Relayed offer. Carries the sender's name so the callee can show
    /// who is calling.
    WebrtcOffer {
        from: ConnectionId,
        display_name: DisplayName,
        offer: Value,
    },

    /// Relayed answer.
    WebrtcAnswer { from: ConnectionId, answer: Value },

    /// Relayed ICE candidate.
    WebrtcIce { from: ConnectionId, candidate: Value },

    /// Reply to `get_peers`.
    PeerList(Vec<PeerEntry>),
}

//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event name,
    /// or a payload with missing or mistyped fields.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The event decoded but is not allowed here, e.g. a `send_message`
    /// before `connect`, or a `connect` with an unsupported version.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

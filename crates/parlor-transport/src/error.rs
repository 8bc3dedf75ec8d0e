//! Transport errors.

use std::io;

/// Failures on the socket layer. Each one concerns a single client.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The socket is already closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Binding the listener, accepting a socket, or the WebSocket upgrade
    /// failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] io::Error),

    #[error("send failed: {0}")]
    SendFailed(#[source] io::Error),

    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] io::Error),

    /// The client sent a frame above the configured limit. The socket is
    /// unusable afterwards.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
}

#[cfg(feature = "websocket")]
impl TransportError {
    /// Maps a tungstenite error on the read or write path.
    pub(crate) fn from_ws(
        err: tokio_tungstenite::tungstenite::Error,
        reading: bool,
        limit: usize,
    ) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                Self::ConnectionClosed(err.to_string())
            }
            WsError::Capacity(_) => Self::FrameTooLarge { limit },
            WsError::Io(e) if reading => Self::ReceiveFailed(e),
            WsError::Io(e) => Self::SendFailed(e),
            other if reading => {
                Self::ReceiveFailed(io::Error::new(io::ErrorKind::InvalidData, other))
            }
            other => Self::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, other)),
        }
    }
}

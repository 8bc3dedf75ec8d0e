//! Error types for the room layer.

use parlor_session::SessionError;

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The room actor has stopped or its channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(String),

    /// Admission was refused by the presence registry.
    #[error("admission refused: {0}")]
    Rejected(#[from] SessionError),

    /// A chat line failed validation. Never reported to the sender.
    #[error("invalid chat message: {0}")]
    Validation(String),
}

//! Per-connection session types.
//!
//! A [`Connection`] is the registry's record of an admitted socket.
//! [`SessionState`] is the lifecycle each socket goes through, tracked by
//! the connection handler:
//!
//! ```text
//!   Unauthenticated ──(admit)──→ Admitted ──(remove)──→ Removed
//! ```
//!
//! `Removed` is terminal. A socket refused at the gate never leaves
//! `Unauthenticated`; it is simply closed.

use std::fmt;

use chrono::{DateTime, Utc};
use parlor_protocol::{ConnectionId, DisplayName};

use crate::SessionError;

/// An admitted connection.
///
/// Identity fields are fixed at admission; the registry has no update
/// operation. Values handed out by the registry are copies, so holding
/// one never keeps a departed connection alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// Transport-assigned id of the socket.
    pub connection_id: ConnectionId,
    /// Name shown to the room.
    pub display_name: DisplayName,
    /// When the connection was admitted.
    pub joined_at: DateTime<Utc>,
}

/// Lifecycle state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Socket accepted, `connect` not yet validated.
    #[default]
    Unauthenticated,
    /// Present in the registry; room and signaling events are allowed.
    Admitted,
    /// Left the registry. Terminal.
    Removed,
}

impl SessionState {
    /// `Unauthenticated → Admitted`.
    pub fn admit(self) -> Result<Self, SessionError> {
        match self {
            Self::Unauthenticated => Ok(Self::Admitted),
            from => Err(SessionError::InvalidTransition {
                from,
                to: Self::Admitted,
            }),
        }
    }

    /// `Admitted → Removed`.
    pub fn remove(self) -> Result<Self, SessionError> {
        match self {
            Self::Admitted => Ok(Self::Removed),
            from => Err(SessionError::InvalidTransition {
                from,
                to: Self::Removed,
            }),
        }
    }

    /// Whether room and signaling events may be processed.
    pub fn is_admitted(self) -> bool {
        matches!(self, Self::Admitted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthenticated => "Unauthenticated",
            Self::Admitted => "Admitted",
            Self::Removed => "Removed",
        };
        f.write_str(s)
    }
}

//! Error types for the session layer.

use parlor_protocol::{ConnectionId, DisplayName, InvalidDisplayName};

use crate::SessionState;

/// Errors from the session gate, the presence registry, and the
/// per-connection state machine.
///
/// The first three variants are admission errors: they are reported to
/// the connecting client and no registry entry exists afterwards.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The shared secret did not match.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested display name is too short or too long.
    #[error(transparent)]
    InvalidDisplayName(#[from] InvalidDisplayName),

    /// Another live connection already uses this display name.
    #[error("display name {0} is already in use")]
    DuplicateName(DisplayName),

    /// This connection already has a registry entry.
    #[error("{0} is already admitted")]
    AlreadyAdmitted(ConnectionId),

    /// No registry entry exists for the connection. Callers treat this as
    /// a no-op: a disconnect can race with a refused admission.
    #[error("no registry entry for {0}")]
    NotFound(ConnectionId),

    /// A connection tried to move between lifecycle states in a way the
    /// state machine forbids.
    #[error("invalid session transition from {from} to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

impl SessionError {
    /// Returns `true` for errors that refuse an admission attempt.
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::AuthFailed(_)
                | Self::InvalidDisplayName(_)
                | Self::DuplicateName(_)
                | Self::AlreadyAdmitted(_)
        )
    }

    /// HTTP-style code sent in the `rejected` event.
    pub fn rejection_code(&self) -> u16 {
        match self {
            Self::AuthFailed(_) => 401,
            Self::InvalidDisplayName(_) => 400,
            Self::DuplicateName(_) | Self::AlreadyAdmitted(_) => 409,
            Self::NotFound(_) => 404,
            Self::InvalidTransition { .. } => 400,
        }
    }
}

//! Unified error type for Parlor.

use parlor_protocol::ProtocolError;
use parlor_room::RoomError;
use parlor_session::SessionError;
use parlor_store::StoreError;
use parlor_transport::TransportError;

use crate::ConfigError;

/// Top-level error wrapping every crate-specific error, so `?` works
/// across layers.
#[derive(Debug, thiserror::Error)]
pub enum ParlorError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Admission refused or registry inconsistency.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// Startup configuration problem.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

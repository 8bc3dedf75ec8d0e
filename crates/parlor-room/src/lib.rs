//! The single chat room for Parlor.
//!
//! One actor task owns all room-affecting work: admission announcements,
//! chat fan-out, departures and signaling relay. Membership lives in the
//! shared [`PresenceRegistry`](parlor_session::PresenceRegistry); the
//! actor never keeps its own copy.
//!
//! # Key types
//!
//! - [`RoomHandle`] — send commands to the running actor
//! - [`dispatch`] — client event → [`Outcome`], no transport needed
//! - [`SignalingEnvelope`] — one offer, answer or ICE candidate in flight
//! - [`RoomConfig`] — room name, content limit, history window

pub mod broadcaster;
mod config;
mod dispatch;
mod error;
mod relay;
mod room;

pub use config::{MAX_CONTENT_CHARS, RoomConfig};
pub use dispatch::{Delivery, Outcome, dispatch};
pub use error::RoomError;
pub use relay::{SignalKind, SignalingEnvelope, list_peers, relay};
pub use room::{Admission, RoomHandle, RoomInfo, spawn_room};

//! Session gate and presence registry for Parlor.
//!
//! 1. **Gate** — checking the room secret once per connection
//!    ([`Authenticator`], [`SharedSecretGate`])
//! 2. **Presence** — the authoritative map of who is connected
//!    ([`PresenceRegistry`])
//! 3. **Lifecycle** — `Unauthenticated → Admitted → Removed`
//!    ([`SessionState`])
//!
//! ```text
//! Room Layer (above)     ← reads membership, fans out through outboxes
//!     ↕
//! Session Layer (this)   ← admits, removes, answers "who is here"
//!     ↕
//! Protocol Layer (below) ← DisplayName, ServerEvent, PeerEntry
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod registry;
mod session;

pub use auth::{Authenticator, SharedSecretGate};
pub use error::SessionError;
pub use registry::{Outbox, PresenceRegistry};
pub use session::{Connection, SessionState};

//! Session gate: the admission check every connection passes once.
//!
//! Parlor does not own user accounts. The room is protected by one shared
//! secret; whoever presents it may pick a display name. The check is a
//! trait so deployments can put something stronger in front (a signed
//! ticket from a login page, for instance) without touching the server.

use crate::SessionError;

/// Validates the token a client presents in its `connect` event.
///
/// Called exactly once per connection, before the presence registry is
/// touched. Later events are authorized by registry membership, not by
/// calling this again.
///
/// # Example
///
/// ```rust
/// use parlor_session::{Authenticator, SessionError};
///
/// /// Lets everyone in. Development only.
/// struct OpenDoor;
///
/// impl Authenticator for OpenDoor {
///     async fn authenticate(&self, _token: &str) -> Result<(), SessionError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns `Ok(())` if `token` grants entry to the room.
    ///
    /// # Errors
    /// `SessionError::AuthFailed` when the token is rejected.
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// Admits any client presenting the room's shared secret.
///
/// Comparison is exact: no trimming, no case folding. Stateless, so one
/// instance serves every connection.
#[derive(Clone)]
pub struct SharedSecretGate {
    secret: String,
}

impl SharedSecretGate {
    /// Creates a gate for the given secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for SharedSecretGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecretGate")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl Authenticator for SharedSecretGate {
    async fn authenticate(&self, token: &str) -> Result<(), SessionError> {
        if token == self.secret {
            Ok(())
        } else {
            Err(SessionError::AuthFailed("incorrect room secret".into()))
        }
    }
}

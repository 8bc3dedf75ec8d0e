//! Room-wide chat and presence announcements.
//!
//! Everything here computes [`Delivery`] lists against the registry and
//! returns; the room actor sends them after every registry call has
//! released its lock.

use chrono::Utc;
use parlor_protocol::{ChatMessage, ConnectionId, DisplayName, ServerEvent};
use parlor_session::{Connection, PresenceRegistry};

use crate::{Delivery, RoomError};

/// Text of the join announcement.
pub fn joined_text(name: &DisplayName) -> String {
    format!("✦ {name} joined the room")
}

/// Text of the departure announcement.
pub fn left_text(name: &DisplayName) -> String {
    format!("✦ {name} left the room")
}

/// Roster refresh and join announcement for a freshly admitted
/// connection. Both go to the whole room, the joiner included.
pub async fn on_join(registry: &PresenceRegistry, connection: &Connection) -> Vec<Delivery> {
    let roster = registry.snapshot().await;
    vec![
        Delivery::room(ServerEvent::UserList(roster)),
        Delivery::room(ServerEvent::SystemMessage {
            text: joined_text(&connection.display_name),
        }),
    ]
}

/// Removes `connection_id` and announces the departure.
///
/// Nothing is announced when the registry had no entry: a socket refused
/// at admission, or one already removed, never produces a departure.
pub async fn on_leave(registry: &PresenceRegistry, connection_id: ConnectionId) -> Vec<Delivery> {
    let Ok(connection) = registry.remove(connection_id).await else {
        tracing::debug!(%connection_id, "leave for unknown connection, ignoring");
        return Vec::new();
    };

    let roster = registry.snapshot().await;
    vec![
        Delivery::room(ServerEvent::UserList(roster)),
        Delivery::room(ServerEvent::SystemMessage {
            text: left_text(&connection.display_name),
        }),
    ]
}

/// Trims `raw` and checks it is 1..=`max_chars` characters long.
///
/// # Errors
/// [`RoomError::Validation`] for empty or oversized content. Content is
/// never truncated.
pub fn validate_content(raw: &str, max_chars: usize) -> Result<String, RoomError> {
    let content = raw.trim();
    if content.is_empty() {
        return Err(RoomError::Validation("empty message".into()));
    }
    let chars = content.chars().count();
    if chars > max_chars {
        return Err(RoomError::Validation(format!(
            "message has {chars} characters, limit is {max_chars}"
        )));
    }
    Ok(content.to_owned())
}

/// Builds the [`ChatMessage`] for a `send_message` from `from`.
///
/// The author's name comes from the registry, never from the client.
///
/// # Errors
/// - [`RoomError::Rejected`] if `from` is not admitted.
/// - [`RoomError::Validation`] if the content is empty or too long.
pub async fn on_chat_message(
    registry: &PresenceRegistry,
    from: ConnectionId,
    raw_content: &str,
    max_chars: usize,
) -> Result<ChatMessage, RoomError> {
    let sender = registry.get(from).await?;
    let content = validate_content(raw_content, max_chars)?;
    Ok(ChatMessage {
        display_name: sender.display_name,
        content,
        created_at: Utc::now(),
    })
}

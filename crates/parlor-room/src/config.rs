//! Room configuration.

use serde::{Deserialize, Serialize};

/// Longest accepted chat line, in characters, after trimming.
pub const MAX_CONTENT_CHARS: usize = 1000;

/// Settings for the room actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Shown in logs.
    pub name: String,

    /// Chat lines longer than this (after trimming) are dropped.
    pub max_content_chars: usize,

    /// How many stored messages a joiner receives as `history`.
    pub history_limit: usize,

    /// Capacity of the actor's command channel. Senders wait when it is
    /// full.
    pub command_buffer: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "lobby".into(),
            max_content_chars: MAX_CONTENT_CHARS,
            history_limit: 50,
            command_buffer: 64,
        }
    }
}

//! The persistence port and two reference adapters.

use std::collections::VecDeque;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parlor_protocol::ChatMessage;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::StoreError;

/// Durable chat history, as seen by the room.
///
/// Implementations may be slow or down; the room only ever talks to them
/// through a [`PersistenceHandle`](crate::PersistenceHandle), which makes
/// every call best-effort.
pub trait MessageStore: Send + Sync + 'static {
    /// Appends one accepted message.
    fn append(
        &self,
        message: &ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Returns up to `limit` of the most recent messages, oldest first.
    fn recent(
        &self,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, StoreError>> + Send;
}

// ---------------------------------------------------------------------------
// InMemoryStore
// ---------------------------------------------------------------------------

/// Keeps the last `retain` messages in memory. Lost on restart.
pub struct InMemoryStore {
    messages: Mutex<VecDeque<ChatMessage>>,
    retain: usize,
}

impl InMemoryStore {
    /// Creates a store that keeps at most `retain` messages.
    pub fn new(retain: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::with_capacity(retain.min(1024))),
            retain,
        }
    }
}

impl MessageStore for InMemoryStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().await;
        messages.push_back(message.clone());
        while messages.len() > self.retain {
            messages.pop_front();
        }
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = self.messages.lock().await;
        let skip = messages.len().saturating_sub(limit);
        Ok(messages.iter().skip(skip).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// JsonLinesStore
// ---------------------------------------------------------------------------

/// Appends each message as one JSON line to a file.
///
/// Lines that fail to parse (a torn write, a hand edit) are skipped when
/// reading, so one bad line never hides the rest of the history.
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    /// Uses `path` as the history file. It is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The history file location.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageStore for JsonLinesStore {
    async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let mut line = serde_json::to_vec(message)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    // TODO: seek backwards from the end instead of reading the whole file
    // once history files grow past a few megabytes.
    async fn recent(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut messages: Vec<ChatMessage> = contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(message) => Some(message),
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable history line");
                    None
                }
            })
            .collect();

        let skip = messages.len().saturating_sub(limit);
        Ok(messages.split_off(skip))
    }
}

//! Background persistence worker.
//!
//! The room never awaits a [`MessageStore`] directly. It hands jobs to a
//! bounded queue drained by one task; a full queue sheds the job with a
//! warning instead of applying backpressure to live chat.

use std::time::Duration;

use parlor_protocol::ChatMessage;
use tokio::sync::{mpsc, oneshot};

use crate::MessageStore;

/// How long a history read may take before the caller gets an empty list.
pub const DEFAULT_RECENT_TIMEOUT: Duration = Duration::from_secs(2);

enum Job {
    Append(ChatMessage),
    Recent {
        limit: usize,
        reply: oneshot::Sender<Vec<ChatMessage>>,
    },
}

/// Cloneable front of a running persistence worker.
#[derive(Clone)]
pub struct PersistenceHandle {
    sender: mpsc::Sender<Job>,
    recent_timeout: Duration,
}

impl PersistenceHandle {
    /// Queues `message` for storage without waiting.
    ///
    /// Returns `false` if the job was dropped (queue full or worker gone).
    /// The message has already been delivered either way.
    pub fn append(&self, message: ChatMessage) -> bool {
        match self.sender.try_send(Job::Append(message)) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("persistence queue full, dropping message");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("persistence worker stopped, dropping message");
                false
            }
        }
    }

    /// Up to `limit` recent messages, oldest first.
    ///
    /// Any failure (store error, worker gone, timeout) yields an empty
    /// list: a history-less join beats a stuck one. The timeout covers
    /// queueing the read as well as waiting for it, so a stalled store
    /// with a full queue still answers in time.
    pub async fn recent(&self, limit: usize) -> Vec<ChatMessage> {
        match tokio::time::timeout(self.recent_timeout, self.read_recent(limit)).await {
            Ok(Some(messages)) => messages,
            Ok(None) => {
                tracing::warn!("persistence worker stopped, no history");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.recent_timeout, "history read timed out");
                Vec::new()
            }
        }
    }

    async fn read_recent(&self, limit: usize) -> Option<Vec<ChatMessage>> {
        let (reply, rx) = oneshot::channel();
        self.sender.send(Job::Recent { limit, reply }).await.ok()?;
        rx.await.ok()
    }

    /// Queues a history read without waiting and returns the pending
    /// answer.
    ///
    /// The read lands behind every append queued so far, so a caller that
    /// serializes appends (the room actor) gets a history that ends
    /// exactly where its live stream begins. A full queue yields an empty
    /// history rather than a wait.
    pub fn request_recent(&self, limit: usize) -> PendingHistory {
        let (reply, rx) = oneshot::channel();
        let rx = match self.sender.try_send(Job::Recent { limit, reply }) {
            Ok(()) => Some(rx),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("persistence queue full, skipping history");
                None
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::warn!("persistence worker stopped, no history");
                None
            }
        };
        PendingHistory {
            rx,
            timeout: self.recent_timeout,
        }
    }

    /// Overrides [`DEFAULT_RECENT_TIMEOUT`].
    pub fn with_recent_timeout(mut self, timeout: Duration) -> Self {
        self.recent_timeout = timeout;
        self
    }
}

/// A history read queued by [`PersistenceHandle::request_recent`].
#[derive(Debug)]
pub struct PendingHistory {
    rx: Option<oneshot::Receiver<Vec<ChatMessage>>>,
    timeout: Duration,
}

impl PendingHistory {
    /// Waits for the messages, oldest first. Empty if the read was never
    /// queued, failed, or outlived the handle's recent timeout.
    pub async fn wait(self) -> Vec<ChatMessage> {
        let Some(rx) = self.rx else {
            return Vec::new();
        };
        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(messages)) => messages,
            Ok(Err(_)) => Vec::new(),
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "history read timed out");
                Vec::new()
            }
        }
    }
}

/// Spawns the worker that owns `store` and returns its handle.
///
/// `capacity` bounds the number of queued jobs (minimum 1). The worker
/// exits once every handle is dropped.
pub fn spawn_worker<S: MessageStore>(store: S, capacity: usize) -> PersistenceHandle {
    let (sender, mut rx) = mpsc::channel(capacity.max(1));

    tokio::spawn(async move {
        tracing::debug!(capacity, "persistence worker started");
        while let Some(job) = rx.recv().await {
            match job {
                Job::Append(message) => {
                    if let Err(e) = store.append(&message).await {
                        tracing::warn!(error = %e, "failed to persist message");
                    }
                }
                Job::Recent { limit, reply } => {
                    let messages = match store.recent(limit).await {
                        Ok(messages) => messages,
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to load history");
                            Vec::new()
                        }
                    };
                    let _ = reply.send(messages);
                }
            }
        }
        tracing::debug!("persistence worker stopped");
    });

    PersistenceHandle {
        sender,
        recent_timeout: DEFAULT_RECENT_TIMEOUT,
    }
}

//! Error types for the persistence layer.

/// Errors a [`MessageStore`](crate::MessageStore) may return.
///
/// None of these ever reach a chat participant: the persistence worker
/// logs them and carries on.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed.
    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be serialized for storage.
    #[error("store serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backend is not reachable right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

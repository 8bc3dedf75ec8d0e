//! The presence registry: who is in the room right now.
//!
//! This is the single source of truth for membership. The roster, the
//! peer list, and every fan-out are derived from it at the moment they
//! are needed; nothing else keeps its own member list.
//!
//! # Concurrency
//!
//! All state sits behind one `tokio::sync::Mutex`, so the duplicate-name
//! check and the insert happen atomically and readers never observe a
//! half-applied change. Every method copies what it needs out of the map
//! and releases the lock before returning; callers do network sends and
//! persistence with no lock held.

use std::collections::HashMap;

use chrono::Utc;
use parlor_protocol::{ConnectionId, DisplayName, PeerEntry, ServerEvent};
use tokio::sync::{Mutex, mpsc};

use crate::{Connection, SessionError};

/// Delivery handle for one connection.
///
/// The connection's own task drains the receiving end and writes to the
/// socket. Unbounded so that fan-out never waits on a slow reader; a send
/// into a closed outbox (the socket is gone) is ignored.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// A registry entry: the public record plus what the registry needs
/// privately to deliver to and order it.
struct Entry {
    connection: Connection,
    outbox: Outbox,
    /// Admission sequence number. Snapshots are sorted by this, so the
    /// roster lists people in the order they arrived.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ConnectionId, Entry>,
    next_seq: u64,
}

impl Inner {
    fn ordered(&self) -> Vec<&Entry> {
        let mut entries: Vec<&Entry> = self.entries.values().collect();
        entries.sort_by_key(|e| e.seq);
        entries
    }
}

/// Live map of admitted connections.
///
/// ```text
/// admit() ──→ [entry present] ──→ remove()
///   │                                │
///   └─ DuplicateName / AlreadyAdmitted └─ NotFound (caller: no-op)
/// ```
///
/// Created once at server start and shared by `Arc` with the room and
/// the connection handlers.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<Inner>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection under `display_name`.
    ///
    /// Announcing the join is the caller's job.
    ///
    /// # Errors
    /// - [`SessionError::DuplicateName`] if a live connection already
    ///   uses exactly this name (case-sensitive).
    /// - [`SessionError::AlreadyAdmitted`] if `connection_id` already has
    ///   an entry.
    pub async fn admit(
        &self,
        connection_id: ConnectionId,
        display_name: DisplayName,
        outbox: Outbox,
    ) -> Result<Connection, SessionError> {
        let mut inner = self.inner.lock().await;

        if inner.entries.contains_key(&connection_id) {
            return Err(SessionError::AlreadyAdmitted(connection_id));
        }
        if inner
            .entries
            .values()
            .any(|e| e.connection.display_name == display_name)
        {
            return Err(SessionError::DuplicateName(display_name));
        }

        let connection = Connection {
            connection_id,
            display_name,
            joined_at: Utc::now(),
        };
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            connection_id,
            Entry {
                connection: connection.clone(),
                outbox,
                seq,
            },
        );

        tracing::info!(
            %connection_id,
            display_name = %connection.display_name,
            members = inner.entries.len(),
            "connection admitted"
        );
        Ok(connection)
    }

    /// Removes a connection and returns its record.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no entry. Treat it as a
    /// no-op; it is the normal outcome for a socket that was refused at
    /// admission or already removed.
    pub async fn remove(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Connection, SessionError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .entries
            .remove(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;

        tracing::info!(
            %connection_id,
            display_name = %entry.connection.display_name,
            members = inner.entries.len(),
            "connection removed"
        );
        Ok(entry.connection)
    }

    /// Looks up an admitted connection.
    ///
    /// Every room and signaling event is authorized through this: an
    /// event from a connection without an entry is dropped.
    ///
    /// # Errors
    /// [`SessionError::NotFound`] if there is no entry.
    pub async fn get(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Connection, SessionError> {
        self.inner
            .lock()
            .await
            .entries
            .get(&connection_id)
            .map(|e| e.connection.clone())
            .ok_or(SessionError::NotFound(connection_id))
    }

    /// Point-in-time roster in admission order.
    pub async fn snapshot(&self) -> Vec<DisplayName> {
        self.inner
            .lock()
            .await
            .ordered()
            .into_iter()
            .map(|e| e.connection.display_name.clone())
            .collect()
    }

    /// Every admitted connection except `except`, in admission order.
    pub async fn peers(&self, except: ConnectionId) -> Vec<PeerEntry> {
        self.inner
            .lock()
            .await
            .ordered()
            .into_iter()
            .filter(|e| e.connection.connection_id != except)
            .map(|e| PeerEntry {
                connection_id: e.connection.connection_id,
                display_name: e.connection.display_name.clone(),
            })
            .collect()
    }

    /// Delivery handle for one connection, if it is admitted.
    pub async fn outbox(&self, connection_id: ConnectionId) -> Option<Outbox> {
        self.inner
            .lock()
            .await
            .entries
            .get(&connection_id)
            .map(|e| e.outbox.clone())
    }

    /// Delivery handles for every member, in admission order.
    pub async fn outboxes(&self) -> Vec<(ConnectionId, Outbox)> {
        self.inner
            .lock()
            .await
            .ordered()
            .into_iter()
            .map(|e| (e.connection.connection_id, e.outbox.clone()))
            .collect()
    }

    /// Number of admitted connections.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Returns `true` if nobody is admitted.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn name(s: &str) -> DisplayName {
        DisplayName::parse(s).unwrap()
    }

    /// An outbox whose receiver is dropped; sends are silently lost.
    fn outbox() -> Outbox {
        mpsc::unbounded_channel().0
    }

    // =====================================================================
    // admit()
    // =====================================================================

    #[tokio::test]
    async fn test_admit_returns_connection_record() {
        let registry = PresenceRegistry::new();
        let conn = registry.admit(cid(1), name("alice"), outbox()).await.unwrap();

        assert_eq!(conn.connection_id, cid(1));
        assert_eq!(conn.display_name, name("alice"));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_admit_duplicate_name_is_rejected_and_size_unchanged() {
        let registry = PresenceRegistry::new();
        registry.admit(cid(1), name("alice"), outbox()).await.unwrap();

        let result = registry.admit(cid(2), name("alice"), outbox()).await;
        assert!(matches!(result, Err(SessionError::DuplicateName(n)) if n == name("alice")));
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(cid(2)).await.is_err());
    }

    #[tokio::test]
    async fn test_admit_duplicate_check_is_case_sensitive() {
        let registry = PresenceRegistry::new();
        registry.admit(cid(1), name("alice"), outbox()).await.unwrap();
        registry.admit(cid(2), name("Alice"), outbox()).await.unwrap();
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_admit_same_connection_twice_is_rejected() {
        let registry = PresenceRegistry::new();
        registry.admit(cid(1), name("alice"), outbox()).await.unwrap();

        let result = registry.admit(cid(1), name("bob"), outbox()).await;
        assert!(matches!(result, Err(SessionError::AlreadyAdmitted(_))));
        assert_eq!(registry.snapshot().await, vec![name("alice")]);
    }

    #[tokio::test]
    async fn test_admit_name_is_reusable_after_removal() {
        let registry = PresenceRegistry::new();
        registry.admit(cid(1), name("alice"), outbox()).await.unwrap();
        registry.remove(cid(1)).await.unwrap();

        assert!(registry.admit(cid(2), name("alice"), outbox()).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_admit_concurrent_same_name_exactly_one_wins() {
        let registry = Arc::new(PresenceRegistry::new());

        let mut handles = Vec::new();
        for i in 1..=16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.admit(cid(i), name("alice"), outbox()).await
            }));
        }

        let mut wins = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(SessionError::DuplicateName(_)) => duplicates += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(duplicates, 15);
        assert_eq!(registry.snapshot().await, vec![name("alice")]);
    }

    // =====================================================================
    // remove() / get()
    // =====================================================================

    #[tokio::test]
    async fn test_remove_unknown_connection_is_not_found() {
        let registry = PresenceRegistry::new();
        let result = registry.remove(cid(9)).await;
        assert!(matches!(result, Err(SessionError::NotFound(id)) if id == cid(9)));
    }

    #[tokio::test]
    async fn test_remove_twice_second_is_not_found() {
        let registry = PresenceRegistry::new();
        registry.admit(cid(1), name("alice"), outbox()).await.unwrap();

        let removed = registry.remove(cid(1)).await.unwrap();
        assert_eq!(removed.display_name, name("alice"));
        assert!(registry.remove(cid(1)).await.is_err());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_unknown_connection_is_not_found() {
        let registry = PresenceRegistry::new();
        assert!(matches!(
            registry.get(cid(3)).await,
            Err(SessionError::NotFound(_))
        ));
    }

    // =====================================================================
    // snapshot() / peers() / outboxes()
    // =====================================================================

    #[tokio::test]
    async fn test_snapshot_is_in_admission_order() {
        let registry = PresenceRegistry::new();
        // Connection ids deliberately out of order.
        registry.admit(cid(5), name("carol"), outbox()).await.unwrap();
        registry.admit(cid(2), name("alice"), outbox()).await.unwrap();
        registry.admit(cid(9), name("bob"), outbox()).await.unwrap();

        assert_eq!(
            registry.snapshot().await,
            vec![name("carol"), name("alice"), name("bob")]
        );
    }

    #[tokio::test]
    async fn test_snapshot_matches_admitted_set_across_operation_sequence() {
        // Deterministic pseudo-random admit/remove script.
        let registry = PresenceRegistry::new();
        let mut expected: Vec<(u64, String)> = Vec::new();
        let mut state: u64 = 0x2545_f491;

        for step in 0..200u64 {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let slot = (state >> 33) % 8;
            let display = format!("user{slot}");

            if expected.iter().any(|(id, _)| *id == slot) {
                registry.remove(cid(slot)).await.unwrap();
                expected.retain(|(id, _)| *id != slot);
            } else {
                registry
                    .admit(cid(slot), name(&display), outbox())
                    .await
                    .unwrap();
                expected.push((slot, display));
            }

            let roster = registry.snapshot().await;
            let want: Vec<DisplayName> =
                expected.iter().map(|(_, n)| name(n)).collect();
            assert_eq!(roster, want, "roster diverged at step {step}");
        }
    }

    #[tokio::test]
    async fn test_peers_excludes_requester_and_lists_others_once() {
        let registry = PresenceRegistry::new();
        registry.admit(cid(1), name("alice"), outbox()).await.unwrap();
        registry.admit(cid(2), name("bob"), outbox()).await.unwrap();
        registry.admit(cid(3), name("carol"), outbox()).await.unwrap();

        let peers = registry.peers(cid(2)).await;
        let ids: Vec<ConnectionId> = peers.iter().map(|p| p.connection_id).collect();
        assert_eq!(ids, vec![cid(1), cid(3)]);

        let unique: HashSet<ConnectionId> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[tokio::test]
    async fn test_peers_for_lone_member_is_empty() {
        let registry = PresenceRegistry::new();
        registry.admit(cid(1), name("alice"), outbox()).await.unwrap();
        assert!(registry.peers(cid(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_outbox_delivers_to_admitted_connection() {
        let registry = PresenceRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.admit(cid(1), name("alice"), tx).await.unwrap();

        let outbox = registry.outbox(cid(1)).await.expect("admitted");
        outbox
            .send(ServerEvent::SystemMessage { text: "hello".into() })
            .unwrap();
        assert_eq!(
            rx.recv().await,
            Some(ServerEvent::SystemMessage { text: "hello".into() })
        );

        assert!(registry.outbox(cid(2)).await.is_none());
        assert_eq!(registry.outboxes().await.len(), 1);
    }
}

//! Integration tests for the room actor, driven through outboxes with no
//! transport in between.

use std::sync::Arc;
use std::time::Duration;

use parlor_protocol::{ClientEvent, ConnectionId, DisplayName, PeerEntry, ServerEvent};
use parlor_room::{RoomConfig, RoomError, RoomHandle, spawn_room};
use parlor_session::{PresenceRegistry, SessionError};
use parlor_store::{InMemoryStore, PersistenceHandle, spawn_worker};
use serde_json::json;
use tokio::sync::mpsc;

// =========================================================================
// Helpers
// =========================================================================

type Inbox = mpsc::UnboundedReceiver<ServerEvent>;

struct Fixture {
    room: RoomHandle,
    registry: Arc<PresenceRegistry>,
    persistence: PersistenceHandle,
}

fn fixture() -> Fixture {
    let registry = Arc::new(PresenceRegistry::new());
    let persistence = spawn_worker(InMemoryStore::new(100), 16);
    let room = spawn_room(RoomConfig::default(), registry.clone(), persistence.clone());
    Fixture {
        room,
        registry,
        persistence,
    }
}

fn id(n: u64) -> ConnectionId {
    ConnectionId::new(n)
}

fn name(s: &str) -> DisplayName {
    DisplayName::parse(s).unwrap()
}

fn say(content: &str) -> ClientEvent {
    ClientEvent::SendMessage {
        content: content.into(),
    }
}

async fn join(room: &RoomHandle, n: u64, who: &str) -> Inbox {
    let (tx, rx) = mpsc::unbounded_channel();
    room.join(id(n), name(who), tx).await.unwrap();
    rx
}

async fn next(inbox: &mut Inbox) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("timed out waiting for event")
        .expect("outbox closed")
}

/// Round-trips through the actor so every earlier command has been
/// handled, then drains whatever is queued.
async fn drain(room: &RoomHandle, inbox: &mut Inbox) -> Vec<ServerEvent> {
    room.get_info().await.unwrap();
    let mut events = Vec::new();
    while let Ok(event) = inbox.try_recv() {
        events.push(event);
    }
    events
}

// =========================================================================
// Presence
// =========================================================================

#[tokio::test]
async fn test_join_announces_to_everyone_including_joiner() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    assert_eq!(next(&mut alice).await, ServerEvent::UserList(vec![name("alice")]));
    assert_eq!(
        next(&mut alice).await,
        ServerEvent::SystemMessage {
            text: "✦ alice joined the room".into()
        }
    );

    let mut bob = join(&f.room, 2, "bob").await;
    let roster = ServerEvent::UserList(vec![name("alice"), name("bob")]);
    let joined = ServerEvent::SystemMessage {
        text: "✦ bob joined the room".into(),
    };
    assert_eq!(drain(&f.room, &mut alice).await, vec![roster.clone(), joined.clone()]);
    assert_eq!(drain(&f.room, &mut bob).await, vec![roster, joined]);
}

#[tokio::test]
async fn test_duplicate_name_is_rejected_without_side_effects() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    drain(&f.room, &mut alice).await;

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = f.room.join(id(2), name("alice"), tx).await.unwrap_err();
    assert!(matches!(
        err,
        RoomError::Rejected(SessionError::DuplicateName(ref n)) if n.as_str() == "alice"
    ));

    assert_eq!(f.room.get_info().await.unwrap().members, 1);
    assert!(drain(&f.room, &mut alice).await.is_empty());
}

#[tokio::test]
async fn test_names_are_case_sensitive() {
    let f = fixture();
    join(&f.room, 1, "alice").await;
    join(&f.room, 2, "Alice").await;
    assert_eq!(f.registry.len().await, 2);
}

#[tokio::test]
async fn test_leave_announces_departure() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    let _bob = join(&f.room, 2, "bob").await;
    drain(&f.room, &mut alice).await;

    assert!(f.room.leave(id(2)).await.unwrap());
    assert_eq!(
        drain(&f.room, &mut alice).await,
        vec![
            ServerEvent::UserList(vec![name("alice")]),
            ServerEvent::SystemMessage {
                text: "✦ bob left the room".into()
            },
        ]
    );
}

#[tokio::test]
async fn test_leave_of_unknown_connection_is_silent() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    drain(&f.room, &mut alice).await;

    assert!(!f.room.leave(id(77)).await.unwrap());
    assert!(f.room.leave(id(1)).await.unwrap());
    assert!(!f.room.leave(id(1)).await.unwrap());
    assert!(f.registry.is_empty().await);
}

#[tokio::test]
async fn test_name_is_free_again_after_leave() {
    let f = fixture();
    join(&f.room, 1, "alice").await;
    f.room.leave(id(1)).await.unwrap();
    join(&f.room, 2, "alice").await;
    assert_eq!(f.registry.snapshot().await, vec![name("alice")]);
}

// =========================================================================
// Chat
// =========================================================================

#[tokio::test]
async fn test_alice_and_bob_scenario() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    let mut bob = join(&f.room, 2, "bob").await;
    drain(&f.room, &mut alice).await;
    drain(&f.room, &mut bob).await;

    f.room.send_event(id(1), say("hi")).await.unwrap();
    for inbox in [&mut alice, &mut bob] {
        match next(inbox).await {
            ServerEvent::NewMessage(msg) => {
                assert_eq!(msg.display_name, name("alice"));
                assert_eq!(msg.content, "hi");
            }
            other => panic!("expected new_message, got {other:?}"),
        }
    }

    f.room.leave(id(2)).await.unwrap();
    drop(bob);
    assert_eq!(
        drain(&f.room, &mut alice).await,
        vec![
            ServerEvent::UserList(vec![name("alice")]),
            ServerEvent::SystemMessage {
                text: "✦ bob left the room".into()
            },
        ]
    );

    let stored = f.persistence.recent(50).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "hi");
}

#[tokio::test]
async fn test_whitespace_message_is_neither_broadcast_nor_stored() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    drain(&f.room, &mut alice).await;

    f.room.send_event(id(1), say("  ")).await.unwrap();
    assert!(drain(&f.room, &mut alice).await.is_empty());
    assert!(f.persistence.recent(50).await.is_empty());
}

#[tokio::test]
async fn test_content_length_boundary() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    drain(&f.room, &mut alice).await;

    f.room.send_event(id(1), say(&"x".repeat(1000))).await.unwrap();
    f.room.send_event(id(1), say(&"x".repeat(1001))).await.unwrap();

    let events = drain(&f.room, &mut alice).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ServerEvent::NewMessage(m) if m.content.len() == 1000));
    assert_eq!(f.persistence.recent(50).await.len(), 1);
}

#[tokio::test]
async fn test_message_from_non_member_is_dropped() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    drain(&f.room, &mut alice).await;

    f.room.send_event(id(9), say("sneaky")).await.unwrap();
    assert!(drain(&f.room, &mut alice).await.is_empty());
}

#[tokio::test]
async fn test_fan_out_preserves_arrival_order() {
    let f = fixture();
    let _alice = join(&f.room, 1, "alice").await;
    let mut bob = join(&f.room, 2, "bob").await;
    drain(&f.room, &mut bob).await;

    for i in 0..50 {
        f.room.send_event(id(1), say(&format!("m{i}"))).await.unwrap();
    }

    let contents: Vec<String> = drain(&f.room, &mut bob)
        .await
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::NewMessage(m) => Some(m.content),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = (0..50).map(|i| format!("m{i}")).collect();
    assert_eq!(contents, expected);
}

#[tokio::test]
async fn test_closed_outbox_does_not_block_others() {
    let f = fixture();
    let alice = join(&f.room, 1, "alice").await;
    let mut bob = join(&f.room, 2, "bob").await;
    drop(alice);
    drain(&f.room, &mut bob).await;

    f.room.send_event(id(2), say("still here")).await.unwrap();
    assert!(matches!(next(&mut bob).await, ServerEvent::NewMessage(_)));
}

#[tokio::test]
async fn test_joiner_sees_each_message_in_history_or_live_exactly_once() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    drain(&f.room, &mut alice).await;

    // Queued ahead of bob's join: must come back as history only.
    f.room.send_event(id(1), say("before")).await.unwrap();

    let (tx, mut bob) = mpsc::unbounded_channel();
    let admission = f.room.join(id(2), name("bob"), tx).await.unwrap();
    assert_eq!(admission.connection.display_name, name("bob"));

    f.room.send_event(id(1), say("after")).await.unwrap();

    let history: Vec<_> = admission
        .history
        .wait()
        .await
        .into_iter()
        .map(|m| m.content)
        .collect();
    assert_eq!(history, vec!["before".to_string()]);

    let live: Vec<_> = drain(&f.room, &mut bob)
        .await
        .into_iter()
        .filter_map(|event| match event {
            ServerEvent::NewMessage(m) => Some(m.content),
            _ => None,
        })
        .collect();
    assert_eq!(live, vec!["after".to_string()]);
}

// =========================================================================
// Signaling
// =========================================================================

#[tokio::test]
async fn test_offer_answer_ice_reach_only_the_target() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    let mut bob = join(&f.room, 2, "bob").await;
    let mut carol = join(&f.room, 3, "carol").await;
    for inbox in [&mut alice, &mut bob, &mut carol] {
        drain(&f.room, inbox).await;
    }

    let offer = json!({"type": "offer", "sdp": "v=0..."});
    f.room
        .send_event(
            id(1),
            ClientEvent::WebrtcOffer {
                target: id(2),
                offer: offer.clone(),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        next(&mut bob).await,
        ServerEvent::WebrtcOffer {
            from: id(1),
            display_name: name("alice"),
            offer,
        }
    );

    f.room
        .send_event(
            id(2),
            ClientEvent::WebrtcAnswer {
                target: id(1),
                answer: json!({"type": "answer"}),
            },
        )
        .await
        .unwrap();
    f.room
        .send_event(
            id(2),
            ClientEvent::WebrtcIce {
                target: id(1),
                candidate: json!({"candidate": "candidate:1"}),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        drain(&f.room, &mut alice).await,
        vec![
            ServerEvent::WebrtcAnswer {
                from: id(2),
                answer: json!({"type": "answer"}),
            },
            ServerEvent::WebrtcIce {
                from: id(2),
                candidate: json!({"candidate": "candidate:1"}),
            },
        ]
    );
    assert!(drain(&f.room, &mut carol).await.is_empty());
}

#[tokio::test]
async fn test_offer_to_absent_target_is_dropped() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    drain(&f.room, &mut alice).await;

    f.room
        .send_event(
            id(1),
            ClientEvent::WebrtcOffer {
                target: id(404),
                offer: json!({}),
            },
        )
        .await
        .unwrap();
    assert!(drain(&f.room, &mut alice).await.is_empty());
}

#[tokio::test]
async fn test_get_peers_goes_to_requester_only() {
    let f = fixture();
    let mut alice = join(&f.room, 1, "alice").await;
    let mut bob = join(&f.room, 2, "bob").await;
    let mut carol = join(&f.room, 3, "carol").await;
    for inbox in [&mut alice, &mut bob, &mut carol] {
        drain(&f.room, inbox).await;
    }

    f.room.send_event(id(2), ClientEvent::GetPeers).await.unwrap();
    assert_eq!(
        drain(&f.room, &mut bob).await,
        vec![ServerEvent::PeerList(vec![
            PeerEntry {
                connection_id: id(1),
                display_name: name("alice"),
            },
            PeerEntry {
                connection_id: id(3),
                display_name: name("carol"),
            },
        ])]
    );
    assert!(drain(&f.room, &mut alice).await.is_empty());
    assert!(drain(&f.room, &mut carol).await.is_empty());
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn test_room_info_reports_members() {
    let f = fixture();
    join(&f.room, 1, "alice").await;
    let info = f.room.get_info().await.unwrap();
    assert_eq!(info.name, RoomConfig::default().name);
    assert_eq!(info.members, 1);
}

#[tokio::test]
async fn test_shutdown_makes_room_unavailable() {
    let f = fixture();
    f.room.shutdown().await.unwrap();

    let (tx, _rx) = mpsc::unbounded_channel();
    let err = f.room.join(id(1), name("alice"), tx).await.unwrap_err();
    assert!(matches!(err, RoomError::Unavailable(_)));
}

//! Client event → handler table.
//!
//! [`dispatch`] turns one [`ClientEvent`] from an admitted connection into
//! an [`Outcome`]: what to persist and who receives what. It never sends
//! anything itself, so it runs the same with or without a transport.

use parlor_protocol::{ChatMessage, ClientEvent, ConnectionId, Recipient, ServerEvent};
use parlor_session::PresenceRegistry;

use crate::relay::{SignalKind, SignalingEnvelope, list_peers, relay};
use crate::{RoomConfig, RoomError, broadcaster};

/// One event bound for one recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub recipient: Recipient,
    pub event: ServerEvent,
}

impl Delivery {
    /// Delivery to every member.
    pub fn room(event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::Room,
            event,
        }
    }

    /// Delivery to exactly one connection.
    pub fn to(connection_id: ConnectionId, event: ServerEvent) -> Self {
        Self {
            recipient: Recipient::Connection(connection_id),
            event,
        }
    }
}

/// Effects of one client event. Persistence runs before delivery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub deliveries: Vec<Delivery>,
    pub persist: Option<ChatMessage>,
}

impl Outcome {
    /// Nothing to do.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns `true` if executing this outcome has no effect.
    pub fn is_empty(&self) -> bool {
        self.deliveries.is_empty() && self.persist.is_none()
    }
}

impl From<Delivery> for Outcome {
    fn from(delivery: Delivery) -> Self {
        Self {
            deliveries: vec![delivery],
            persist: None,
        }
    }
}

/// Routes `event` from `from` to the broadcaster or the relay.
///
/// Events from connections without a registry entry are dropped.
/// `connect` and `disconnect` are lifecycle events owned by the
/// connection handler and produce nothing here.
pub async fn dispatch(
    registry: &PresenceRegistry,
    config: &RoomConfig,
    from: ConnectionId,
    event: ClientEvent,
) -> Outcome {
    if registry.get(from).await.is_err() {
        tracing::debug!(%from, "event from unadmitted connection, dropping");
        return Outcome::none();
    }

    match event {
        ClientEvent::SendMessage { content } => {
            match broadcaster::on_chat_message(registry, from, &content, config.max_content_chars)
                .await
            {
                Ok(message) => Outcome {
                    deliveries: vec![Delivery::room(ServerEvent::NewMessage(message.clone()))],
                    persist: Some(message),
                },
                Err(RoomError::Validation(reason)) => {
                    tracing::debug!(%from, %reason, "chat message rejected");
                    Outcome::none()
                }
                Err(e) => {
                    tracing::debug!(%from, error = %e, "chat message dropped");
                    Outcome::none()
                }
            }
        }

        ClientEvent::WebrtcOffer { target, offer } => {
            signal(registry, SignalKind::Offer, from, target, offer).await
        }
        ClientEvent::WebrtcAnswer { target, answer } => {
            signal(registry, SignalKind::Answer, from, target, answer).await
        }
        ClientEvent::WebrtcIce { target, candidate } => {
            signal(registry, SignalKind::IceCandidate, from, target, candidate).await
        }

        ClientEvent::GetPeers => list_peers(registry, from).await.into(),

        ClientEvent::Connect { .. } => {
            tracing::debug!(%from, "connect from admitted connection, ignoring");
            Outcome::none()
        }
        ClientEvent::Disconnect => Outcome::none(),
    }
}

async fn signal(
    registry: &PresenceRegistry,
    kind: SignalKind,
    from: ConnectionId,
    to: ConnectionId,
    payload: serde_json::Value,
) -> Outcome {
    let envelope = SignalingEnvelope {
        kind,
        from,
        to,
        payload,
    };
    relay(registry, envelope)
        .await
        .map(Outcome::from)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use parlor_protocol::DisplayName;
    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;

    fn id(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    async fn registry_with(names: &[&str]) -> PresenceRegistry {
        let registry = PresenceRegistry::new();
        for (i, n) in names.iter().enumerate() {
            let (tx, _rx) = mpsc::unbounded_channel();
            registry
                .admit(id(i as u64 + 1), DisplayName::parse(n).unwrap(), tx)
                .await
                .unwrap();
        }
        registry
    }

    fn send(content: &str) -> ClientEvent {
        ClientEvent::SendMessage {
            content: content.into(),
        }
    }

    #[tokio::test]
    async fn test_send_message_persists_and_broadcasts() {
        let registry = registry_with(&["alice", "bob"]).await;
        let outcome = dispatch(&registry, &RoomConfig::default(), id(1), send("hi")).await;

        let persisted = outcome.persist.clone().unwrap();
        assert_eq!(persisted.content, "hi");
        assert_eq!(outcome.deliveries.len(), 1);
        assert_eq!(
            outcome.deliveries[0],
            Delivery::room(ServerEvent::NewMessage(persisted))
        );
    }

    #[tokio::test]
    async fn test_whitespace_message_has_no_effect() {
        let registry = registry_with(&["alice"]).await;
        let outcome = dispatch(&registry, &RoomConfig::default(), id(1), send("   ")).await;
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_content_limit_follows_config() {
        let registry = registry_with(&["alice"]).await;
        let config = RoomConfig {
            max_content_chars: 5,
            ..RoomConfig::default()
        };
        assert!(!dispatch(&registry, &config, id(1), send("12345")).await.is_empty());
        assert!(dispatch(&registry, &config, id(1), send("123456")).await.is_empty());
    }

    #[tokio::test]
    async fn test_unadmitted_sender_is_dropped() {
        let registry = registry_with(&["alice"]).await;
        let config = RoomConfig::default();
        assert!(dispatch(&registry, &config, id(9), send("hi")).await.is_empty());
        assert!(dispatch(&registry, &config, id(9), ClientEvent::GetPeers).await.is_empty());
    }

    #[tokio::test]
    async fn test_offer_is_targeted() {
        let registry = registry_with(&["alice", "bob"]).await;
        let outcome = dispatch(
            &registry,
            &RoomConfig::default(),
            id(2),
            ClientEvent::WebrtcOffer {
                target: id(1),
                offer: json!({"type": "offer"}),
            },
        )
        .await;

        assert!(outcome.persist.is_none());
        assert_eq!(outcome.deliveries.len(), 1);
        assert_eq!(outcome.deliveries[0].recipient, Recipient::Connection(id(1)));
    }

    #[tokio::test]
    async fn test_ice_to_missing_target_is_empty() {
        let registry = registry_with(&["alice"]).await;
        let outcome = dispatch(
            &registry,
            &RoomConfig::default(),
            id(1),
            ClientEvent::WebrtcIce {
                target: id(7),
                candidate: json!({"candidate": "a=1"}),
            },
        )
        .await;
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_events_produce_nothing() {
        let registry = registry_with(&["alice"]).await;
        let config = RoomConfig::default();
        let connect = ClientEvent::Connect {
            version: 1,
            token: "s".into(),
            display_name: "mallory".into(),
        };
        assert!(dispatch(&registry, &config, id(1), connect).await.is_empty());
        assert!(dispatch(&registry, &config, id(1), ClientEvent::Disconnect).await.is_empty());
        assert_eq!(registry.len().await, 1);
    }
}

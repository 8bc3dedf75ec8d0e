//! Point-to-point WebRTC signaling relay.
//!
//! Payloads are opaque: the relay never looks inside an offer, answer or
//! candidate. It only checks that both ends are admitted and stamps the
//! sender's id, taken from the registry rather than from the client.

use std::fmt;

use parlor_protocol::{ConnectionId, ServerEvent};
use parlor_session::{Connection, PresenceRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Delivery;

/// The three signaling message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        };
        f.write_str(s)
    }
}

/// One signaling message in flight. Never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalingEnvelope {
    pub kind: SignalKind,
    pub from: ConnectionId,
    pub to: ConnectionId,
    pub payload: Value,
}

impl SignalingEnvelope {
    /// Server event the target receives.
    fn into_event(self, sender: &Connection) -> ServerEvent {
        let from = self.from;
        match self.kind {
            SignalKind::Offer => ServerEvent::WebrtcOffer {
                from,
                display_name: sender.display_name.clone(),
                offer: self.payload,
            },
            SignalKind::Answer => ServerEvent::WebrtcAnswer {
                from,
                answer: self.payload,
            },
            SignalKind::IceCandidate => ServerEvent::WebrtcIce {
                from,
                candidate: self.payload,
            },
        }
    }
}

/// Routes `envelope` to its target.
///
/// Returns `None` (and logs at debug) when either end is not admitted.
/// The sender is not told.
pub async fn relay(registry: &PresenceRegistry, envelope: SignalingEnvelope) -> Option<Delivery> {
    let Ok(sender) = registry.get(envelope.from).await else {
        tracing::debug!(from = %envelope.from, kind = %envelope.kind, "signal from unknown connection");
        return None;
    };
    if registry.get(envelope.to).await.is_err() {
        tracing::debug!(
            from = %envelope.from,
            to = %envelope.to,
            kind = %envelope.kind,
            "signal target gone, dropping"
        );
        return None;
    }

    let to = envelope.to;
    Some(Delivery::to(to, envelope.into_event(&sender)))
}

/// `peer_list` for `requester`: every other admitted connection, in
/// admission order. Delivered to the requester only.
pub async fn list_peers(registry: &PresenceRegistry, requester: ConnectionId) -> Delivery {
    let peers = registry.peers(requester).await;
    Delivery::to(requester, ServerEvent::PeerList(peers))
}

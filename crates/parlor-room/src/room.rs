//! Room actor: the one task every room-affecting command passes through.
//!
//! Connection handlers talk to it through a [`RoomHandle`]. Because the
//! actor processes commands one at a time and writes into unbounded
//! per-connection outboxes, every member sees room events in the order
//! the actor handled them.

use std::sync::Arc;

use parlor_protocol::{ClientEvent, ConnectionId, DisplayName, Recipient};
use parlor_session::{Connection, Outbox, PresenceRegistry};
use parlor_store::{PendingHistory, PersistenceHandle};
use tokio::sync::{mpsc, oneshot};

use crate::{Delivery, Outcome, RoomConfig, RoomError, broadcaster, dispatch};

/// Commands sent to the room actor through its channel.
pub(crate) enum RoomCommand {
    /// Admit a connection and announce it.
    Join {
        connection_id: ConnectionId,
        display_name: DisplayName,
        outbox: Outbox,
        reply: oneshot::Sender<Result<Admission, RoomError>>,
    },

    /// Remove a connection and announce the departure.
    Leave {
        connection_id: ConnectionId,
        reply: oneshot::Sender<bool>,
    },

    /// A client event from an admitted connection.
    Event {
        from: ConnectionId,
        event: ClientEvent,
    },

    /// Request room metadata.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Stop the actor.
    Shutdown,
}

/// A successful join: the registry entry plus the joiner's history.
///
/// The history read was queued by the actor in the same step as the
/// admission. Every chat message lands either in `history` or in the
/// joiner's outbox, never in both and never in neither.
#[derive(Debug)]
pub struct Admission {
    pub connection: Connection,
    pub history: PendingHistory,
}

/// A snapshot of room metadata.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub name: String,
    /// Admitted connections right now.
    pub members: usize,
}

/// Handle to the running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    name: Arc<str>,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// The room's configured name.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.name.to_string())
    }

    /// Admits `connection_id` as `display_name` and announces the join.
    ///
    /// `outbox` receives every event addressed to this connection from
    /// now on, starting with the roster refresh for its own join. The
    /// returned history should reach the client before anything in the
    /// outbox.
    ///
    /// # Errors
    /// - [`RoomError::Rejected`] wrapping the registry's refusal (name
    ///   taken, already admitted).
    /// - [`RoomError::Unavailable`] if the actor is gone.
    pub async fn join(
        &self,
        connection_id: ConnectionId,
        display_name: DisplayName,
        outbox: Outbox,
    ) -> Result<Admission, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                connection_id,
                display_name,
                outbox,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Removes `connection_id`. Returns `false` if it was not a member.
    pub async fn leave(&self, connection_id: ConnectionId) -> Result<bool, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                connection_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Hands a client event to the room (fire-and-forget).
    pub async fn send_event(
        &self,
        from: ConnectionId,
        event: ClientEvent,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Event { from, event })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Requests the current room info.
    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to shut down.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

struct RoomActor {
    config: RoomConfig,
    registry: Arc<PresenceRegistry>,
    persistence: PersistenceHandle,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    async fn run(mut self) {
        tracing::info!(room = %self.config.name, "room actor started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    connection_id,
                    display_name,
                    outbox,
                    reply,
                } => {
                    let result = self.handle_join(connection_id, display_name, outbox).await;
                    let _ = reply.send(result);
                }
                RoomCommand::Leave {
                    connection_id,
                    reply,
                } => {
                    let deliveries = broadcaster::on_leave(&self.registry, connection_id).await;
                    let left = !deliveries.is_empty();
                    self.deliver(deliveries).await;
                    let _ = reply.send(left);
                }
                RoomCommand::Event { from, event } => {
                    let outcome = dispatch(&self.registry, &self.config, from, event).await;
                    self.execute(outcome).await;
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(RoomInfo {
                        name: self.config.name.clone(),
                        members: self.registry.len().await,
                    });
                }
                RoomCommand::Shutdown => {
                    tracing::info!(room = %self.config.name, "room shutting down");
                    break;
                }
            }
        }

        tracing::info!(room = %self.config.name, "room actor stopped");
    }

    async fn handle_join(
        &self,
        connection_id: ConnectionId,
        display_name: DisplayName,
        outbox: Outbox,
    ) -> Result<Admission, RoomError> {
        let connection = self
            .registry
            .admit(connection_id, display_name, outbox)
            .await?;
        // Queued behind every append this actor has issued so far.
        let history = self.persistence.request_recent(self.config.history_limit);
        let deliveries = broadcaster::on_join(&self.registry, &connection).await;
        self.deliver(deliveries).await;
        Ok(Admission {
            connection,
            history,
        })
    }

    async fn execute(&self, outcome: Outcome) {
        if let Some(message) = outcome.persist {
            self.persistence.append(message);
        }
        self.deliver(outcome.deliveries).await;
    }

    /// Pushes each delivery into its recipients' outboxes. A closed
    /// outbox means the connection is on its way out; skip it.
    async fn deliver(&self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            match delivery.recipient {
                Recipient::Room => {
                    for (_, outbox) in self.registry.outboxes().await {
                        let _ = outbox.send(delivery.event.clone());
                    }
                }
                Recipient::Connection(connection_id) => {
                    if let Some(outbox) = self.registry.outbox(connection_id).await {
                        let _ = outbox.send(delivery.event);
                    }
                }
            }
        }
    }
}

/// Spawns the room actor and returns a handle to it.
///
/// `config.command_buffer` bounds the command channel; senders wait when
/// it is full.
pub fn spawn_room(
    config: RoomConfig,
    registry: Arc<PresenceRegistry>,
    persistence: PersistenceHandle,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));
    let name: Arc<str> = Arc::from(config.name.as_str());

    let actor = RoomActor {
        config,
        registry,
        persistence,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    RoomHandle { name, sender: tx }
}

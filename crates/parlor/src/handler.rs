//! Per-connection handler: admission, then event routing.
//!
//! Each accepted socket gets its own task running this handler:
//!   1. Finish the WebSocket upgrade and receive `connect`, both within
//!      the handshake timeout → check version, secret and display name
//!   2. Join the room → send `welcome`, then the history the room queued
//!      for this join
//!   3. Loop: forward client events to the room, write outbox events to
//!      the socket
//!
//! A refused socket gets one `rejected` event and is closed. It never
//! reaches the registry, so nobody sees it come or go.

use std::sync::Arc;

use parlor_protocol::{ClientEvent, Codec, ConnectionId, DisplayName, ProtocolError, ServerEvent};
use parlor_room::{Admission, RoomError, RoomHandle};
use parlor_session::{Authenticator, Outbox, SessionError, SessionState};
use parlor_transport::{Connection, TransportError, Upgrade, WebSocketConnection, WebSocketUpgrade};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::ParlorError;
use crate::server::{PROTOCOL_VERSION, ServerState};

/// Drop guard that takes the connection out of the room when the
/// handler exits, however it exits. `Drop` is synchronous, so the leave
/// runs in a spawned task.
struct AdmissionGuard {
    connection_id: ConnectionId,
    room: RoomHandle,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let room = self.room.clone();
        tokio::spawn(async move {
            if let Err(e) = room.leave(connection_id).await {
                tracing::debug!(%connection_id, error = %e, "leave after disconnect failed");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, C>(
    pending: WebSocketUpgrade,
    state: Arc<ServerState<A, C>>,
) -> Result<(), ParlorError>
where
    A: Authenticator,
    C: Codec,
{
    let connection_id = pending.id();
    let peer_addr = pending.peer_addr();
    tracing::debug!(%connection_id, peer = %peer_addr, "handling new connection");
    let deadline = Instant::now() + state.handshake_timeout;

    // --- Upgrade ---
    let conn = match tokio::time::timeout_at(deadline, pending.upgrade()).await {
        Ok(result) => result?,
        Err(_) => {
            tracing::debug!(%connection_id, peer = %peer_addr, "websocket upgrade timed out");
            return Err(TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "websocket upgrade timed out",
            ))
            .into());
        }
    };

    // --- Admission ---
    let (outbox, mut inbox) = mpsc::unbounded_channel();
    let Admission {
        connection: member,
        history,
    } = match admit(&conn, &state, outbox, deadline).await {
        Ok(admission) => admission,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    let _guard = AdmissionGuard {
        connection_id,
        room: state.room.clone(),
    };
    let session = SessionState::default().admit()?;

    send_event(
        &conn,
        &state.codec,
        &ServerEvent::Welcome {
            connection_id,
            display_name: member.display_name.clone(),
        },
    )
    .await?;
    let messages = history.wait().await;
    send_event(&conn, &state.codec, &ServerEvent::History { messages }).await?;

    // --- Event loop ---
    loop {
        tokio::select! {
            received = conn.recv() => {
                let data = match received {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%connection_id, "connection closed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%connection_id, error = %e, "recv error");
                        break;
                    }
                };

                let event: ClientEvent = match state.codec.decode(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(%connection_id, error = %e, "undecodable frame, skipping");
                        continue;
                    }
                };

                if matches!(event, ClientEvent::Disconnect) {
                    tracing::info!(%connection_id, display_name = %member.display_name, "client disconnected");
                    break;
                }
                state.room.send_event(connection_id, event).await?;
            }
            Some(event) = inbox.recv() => {
                send_event(&conn, &state.codec, &event).await?;
            }
        }
    }

    let session = session.remove()?;
    tracing::debug!(%connection_id, %session, "handler finished");
    let _ = conn.close().await;

    // _guard drops here → room leave fires.
    Ok(())
}

/// Runs the `connect` exchange, which must arrive before `deadline`. On
/// success the connection is in the registry and `outbox` already holds
/// its join broadcast.
async fn admit<A, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, C>,
    outbox: Outbox,
    deadline: Instant,
) -> Result<Admission, ParlorError>
where
    A: Authenticator,
    C: Codec,
{
    let data = match tokio::time::timeout_at(deadline, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before connect".into()).into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("connect timed out".into()).into());
        }
    };

    let (version, token, requested_name) = match state.codec.decode::<ClientEvent>(&data) {
        Ok(ClientEvent::Connect {
            version,
            token,
            display_name,
        }) => (version, token, display_name),
        _ => {
            reject(conn, &state.codec, 400, "first event must be connect").await?;
            return Err(ProtocolError::InvalidMessage("first event must be connect".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        let reason = format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        reject(conn, &state.codec, 400, &reason).await?;
        return Err(ProtocolError::InvalidMessage(reason).into());
    }

    if let Err(e) = state.auth.authenticate(&token).await {
        tracing::info!(connection_id = %conn.id(), "incorrect room secret");
        return Err(refuse(conn, &state.codec, e).await);
    }

    let display_name = match DisplayName::parse(&requested_name) {
        Ok(name) => name,
        Err(e) => return Err(refuse(conn, &state.codec, e.into()).await),
    };

    match state.room.join(conn.id(), display_name, outbox).await {
        Ok(admission) => Ok(admission),
        Err(RoomError::Rejected(e)) => Err(refuse(conn, &state.codec, e).await),
        Err(e) => {
            reject(conn, &state.codec, 503, "room unavailable").await?;
            Err(e.into())
        }
    }
}

/// Sends `rejected` for an admission error and hands the error back.
async fn refuse(conn: &WebSocketConnection, codec: &impl Codec, err: SessionError) -> ParlorError {
    tracing::debug!(connection_id = %conn.id(), error = %err, "admission refused");
    match reject(conn, codec, err.rejection_code(), &err.to_string()).await {
        Ok(()) => err.into(),
        Err(send_err) => send_err,
    }
}

async fn reject(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    reason: &str,
) -> Result<(), ParlorError> {
    send_event(
        conn,
        codec,
        &ServerEvent::Rejected {
            code,
            reason: reason.to_string(),
        },
    )
    .await
}

async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), ParlorError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await?;
    Ok(())
}

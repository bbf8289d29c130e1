//! WebSocket server handler
//!
//! Each socket becomes one session: a writer task drains the connection's
//! outbound queue onto the wire while the session reads client messages and
//! feeds edits to the joined room. The session ends on disconnect, malformed
//! input, idle timeout or eviction, and leaving the room happens when its
//! membership guard drops.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::messages::{ClientMessage, ControlMessage, ServerMessage};
use crate::models::Passphrase;
use crate::sync::{
    receive, CloseReason, Connection, ConnectionError, ConnectionId, EditError, EditThrottle,
    Membership, Outbound, SyncLimits,
};
use crate::AppState;

/// How long a closing session's writer may take to flush its queue
const WRITER_GRACE: Duration = Duration::from_secs(5);

/// WebSocket handler for `/ws/:passphrase`
pub async fn handler(
    ws: WebSocketUpgrade,
    Path(passphrase): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Response> {
    let passphrase: Passphrase = passphrase.parse().map_err(AppError::BadRequest)?;
    let limits = state.config.limits();

    Ok(ws
        .max_message_size(limits.max_message_bytes())
        .on_upgrade(move |socket| handle_socket(socket, passphrase, state))
        .into_response())
}

async fn handle_socket(socket: WebSocket, passphrase: Passphrase, state: Arc<AppState>) {
    let limits = state.config.limits();
    let (sender, receiver) = socket.split();

    let (connection, outbound) = Connection::new(limits.outbound_queue);
    let connection_id = connection.id();
    let writer = tokio::spawn(write_outbound(sender, outbound));

    let membership = Membership::join(
        Arc::clone(&state.registry),
        &passphrase,
        Arc::clone(&connection),
    );
    tracing::info!(%passphrase, %connection_id, "Client joined");

    let reason = run_session(&connection, &membership, receiver, &limits).await;
    connection.close(reason);
    let reason = connection.close_reason().unwrap_or(reason);
    tracing::info!(%passphrase, %connection_id, %reason, "Client left");

    // Leaving drops the room's handle; with ours gone too the writer drains
    // what is left in the queue and closes the socket.
    drop(membership);
    drop(connection);
    finish_writer(writer, reason, connection_id).await;
}

/// Wait for the writer to flush and close the socket.
///
/// An evicted client gets nothing more: its writer may be parked on a peer
/// that stopped reading, so it is aborted outright. Otherwise the writer has
/// `WRITER_GRACE` to drain before it is aborted.
async fn finish_writer(
    mut writer: JoinHandle<()>,
    reason: CloseReason,
    connection_id: ConnectionId,
) {
    if reason == CloseReason::QueueOverflow {
        writer.abort();
    }

    match tokio::time::timeout(WRITER_GRACE, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) if e.is_cancelled() => {
            tracing::debug!(%connection_id, "Writer aborted");
        }
        Ok(Err(e)) => tracing::error!(%connection_id, "Writer task failed: {}", e),
        Err(_) => {
            tracing::warn!(%connection_id, "Writer stalled, dropping socket");
            writer.abort();
        }
    }
}

async fn run_session<S, E>(
    connection: &Connection,
    membership: &Membership,
    frames: S,
    limits: &SyncLimits,
) -> CloseReason
where
    S: Stream<Item = std::result::Result<Message, E>>,
    E: std::fmt::Display,
{
    let inbound = receive(frames, limits.idle_timeout);
    tokio::pin!(inbound);
    let mut throttle = EditThrottle::new(limits.edit_rate_per_sec, limits.edit_burst);

    loop {
        let next = tokio::select! {
            reason = connection.closed() => return reason,
            next = inbound.next() => next,
        };

        let message = match next {
            None => return CloseReason::ChannelClosed,
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                tracing::warn!(connection_id = %connection.id(), "Closing connection: {}", e);
                if let ConnectionError::MalformedMessage(_) = e {
                    connection.send(ServerMessage::Error {
                        message: e.to_string(),
                    });
                }
                return e.close_reason();
            }
        };

        match message {
            ClientMessage::Control(ControlMessage::Ping) => {
                connection.send(ServerMessage::Pong);
            }
            ClientMessage::Edit(edit) => {
                let Some(room) = membership.room() else {
                    return CloseReason::ChannelClosed;
                };

                if !throttle.try_acquire() {
                    connection.send(ServerMessage::Error {
                        message: EditError::RateLimited.to_string(),
                    });
                    continue;
                }

                if let Err(e) = room.apply_edit(connection, edit) {
                    connection.send(ServerMessage::Error {
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}

async fn write_outbound(mut sender: SplitSink<WebSocket, Message>, mut outbound: Outbound) {
    while let Some(message) = outbound.recv().await {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                continue;
            }
        };

        if let Err(e) = sender.send(Message::Text(text)).await {
            tracing::debug!("Failed to send message: {}", e);
            outbound.fail();
            return;
        }
    }

    let _ = sender.send(Message::Close(None)).await;
}

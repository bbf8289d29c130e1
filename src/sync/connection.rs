//! Connection wrapper around one client's outbound queue
//!
//! The server side of a socket is split in two: the `Connection` is shared
//! with the room (which pushes messages into it), while the `Outbound` half is
//! drained by the task that writes to the network. Pushing never blocks; a
//! full queue evicts the connection instead.

use std::sync::{Arc, Weak};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::messages::ServerMessage;

/// Process-local connection identity, never shown to other clients
pub type ConnectionId = Uuid;

/// Why a connection was closed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    #[error("channel closed")]
    ChannelClosed,

    #[error("malformed message")]
    MalformedMessage,

    #[error("idle timeout")]
    IdleTimeout,

    #[error("outbound queue overflow")]
    QueueOverflow,
}

/// Handle to one joined client
pub struct Connection {
    id: ConnectionId,
    outbound: mpsc::Sender<ServerMessage>,
    closed: watch::Sender<Option<CloseReason>>,
}

impl Connection {
    /// Create a connection with a bounded outbound queue
    pub fn new(capacity: usize) -> (Arc<Self>, Outbound) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (closed_tx, closed_rx) = watch::channel(None);
        let connection = Arc::new(Self {
            id: Uuid::new_v4(),
            outbound: tx,
            closed: closed_tx,
        });
        let outbound = Outbound {
            rx,
            closed: closed_rx,
            connection: Arc::downgrade(&connection),
        };
        (connection, outbound)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a message for delivery without waiting.
    ///
    /// Returns whether the message was queued. Messages sent after close are
    /// dropped silently; a full queue closes the connection with
    /// `QueueOverflow`.
    pub fn send(&self, message: ServerMessage) -> bool {
        if self.is_closed() {
            return false;
        }

        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %self.id, "Outbound queue full, evicting connection");
                self.close(CloseReason::QueueOverflow);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.close(CloseReason::ChannelClosed);
                false
            }
        }
    }

    /// Mark the connection closed. Only the first reason sticks; returns
    /// whether this call closed it.
    pub fn close(&self, reason: CloseReason) -> bool {
        let closed = self.closed.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        });
        if closed {
            tracing::debug!(connection_id = %self.id, %reason, "Connection closed");
        }
        closed
    }

    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.closed.borrow()
    }

    /// Wait until the connection is closed
    pub async fn closed(&self) -> CloseReason {
        let mut rx = self.closed.subscribe();
        let reason = rx.wait_for(Option::is_some).await.map(|reason| *reason);
        match reason {
            Ok(Some(reason)) => reason,
            _ => CloseReason::ChannelClosed,
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.close_reason())
            .finish()
    }
}

/// Receiving half of a connection's outbound queue
pub struct Outbound {
    rx: mpsc::Receiver<ServerMessage>,
    closed: watch::Receiver<Option<CloseReason>>,
    connection: Weak<Connection>,
}

impl Outbound {
    /// Next message to deliver.
    ///
    /// Returns `None` once every `Connection` handle is gone and the queue is
    /// drained, or immediately when the connection was evicted for overflow.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        if *self.closed.borrow() == Some(CloseReason::QueueOverflow) {
            return None;
        }

        tokio::select! {
            biased;
            Ok(_) = self.closed.wait_for(|r| *r == Some(CloseReason::QueueOverflow)) => None,
            message = self.rx.recv() => message,
        }
    }

    /// Report that the network side can no longer be written to
    pub fn fail(&self) {
        if let Some(connection) = self.connection.upgrade() {
            connection.close(CloseReason::ChannelClosed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_send_and_recv() {
        let (connection, mut outbound) = Connection::new(4);
        assert!(connection.send(ServerMessage::Pong));
        assert_eq!(outbound.recv().await, Some(ServerMessage::Pong));
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (a, _oa) = Connection::new(1);
        let (b, _ob) = Connection::new(1);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_send_after_close_is_dropped() {
        let (connection, _outbound) = Connection::new(4);
        assert!(connection.close(CloseReason::ChannelClosed));
        assert!(!connection.send(ServerMessage::Pong));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (connection, _outbound) = Connection::new(4);
        assert!(connection.close(CloseReason::IdleTimeout));
        assert!(!connection.close(CloseReason::ChannelClosed));
        assert_eq!(connection.close_reason(), Some(CloseReason::IdleTimeout));
    }

    #[tokio::test]
    async fn test_full_queue_evicts() {
        let (connection, mut outbound) = Connection::new(1);
        assert!(connection.send(ServerMessage::Pong));
        assert!(!connection.send(ServerMessage::Pong));

        assert_eq!(connection.close_reason(), Some(CloseReason::QueueOverflow));
        // The writer abandons the backlog of an evicted connection
        assert_eq!(outbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_recv_drains_after_handles_drop() {
        let (connection, mut outbound) = Connection::new(4);
        connection.send(ServerMessage::Ack { version: 1 });
        connection.close(CloseReason::MalformedMessage);
        drop(connection);

        assert_eq!(outbound.recv().await, Some(ServerMessage::Ack { version: 1 }));
        assert_eq!(outbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_send_to_dropped_outbound_closes() {
        let (connection, outbound) = Connection::new(4);
        drop(outbound);
        assert!(!connection.send(ServerMessage::Pong));
        assert_eq!(connection.close_reason(), Some(CloseReason::ChannelClosed));
    }

    #[tokio::test]
    async fn test_closed_resolves() {
        let (connection, _outbound) = Connection::new(4);
        let waiter = {
            let connection = Arc::clone(&connection);
            tokio::spawn(async move { connection.closed().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        connection.close(CloseReason::QueueOverflow);

        let reason = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reason, CloseReason::QueueOverflow);
    }

    #[test]
    fn test_closed_pending_until_close() {
        let (connection, _outbound) = Connection::new(4);
        let mut closed = tokio_test::task::spawn(connection.closed());
        tokio_test::assert_pending!(closed.poll());

        connection.close(CloseReason::IdleTimeout);
        tokio_test::assert_ready_eq!(closed.poll(), CloseReason::IdleTimeout);
    }

    #[tokio::test]
    async fn test_outbound_fail_closes_connection() {
        let (connection, outbound) = Connection::new(4);
        outbound.fail();
        assert_eq!(connection.close_reason(), Some(CloseReason::ChannelClosed));
    }
}

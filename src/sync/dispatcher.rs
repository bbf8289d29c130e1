//! Broadcast dispatcher: fans an accepted state out to a room's members
//!
//! Only reachable with a room's member map in hand, which the room hands out
//! while holding its lock. Mutation and broadcast therefore happen as one
//! unit per room, and every member sees versions in order.

use std::collections::HashMap;
use std::sync::Arc;

use super::connection::{Connection, ConnectionId};
use crate::messages::ServerMessage;

pub type Members = HashMap<ConnectionId, Arc<Connection>>;

/// Result of one broadcast
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Members that could not take the message (closed or evicted)
    pub dropped: Vec<ConnectionId>,
}

/// Queue an `update` for every member except `exclude`
pub fn broadcast(
    members: &Members,
    version: u64,
    content: &Arc<str>,
    exclude: Option<ConnectionId>,
) -> Delivery {
    let mut delivery = Delivery::default();

    for (id, connection) in members {
        if Some(*id) == exclude {
            continue;
        }

        let message = ServerMessage::Update {
            version,
            content: Arc::clone(content),
        };
        if connection.send(message) {
            delivery.delivered += 1;
        } else {
            delivery.dropped.push(*id);
        }
    }

    if !delivery.dropped.is_empty() {
        tracing::warn!(
            version,
            dropped = delivery.dropped.len(),
            "Broadcast skipped closed members"
        );
    }

    delivery
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::connection::Outbound;

    fn members(n: usize, capacity: usize) -> (Members, Vec<(ConnectionId, Outbound)>) {
        let mut map = Members::new();
        let mut outs = Vec::new();
        for _ in 0..n {
            let (connection, outbound) = Connection::new(capacity);
            outs.push((connection.id(), outbound));
            map.insert(connection.id(), connection);
        }
        (map, outs)
    }

    #[tokio::test]
    async fn test_broadcast_excludes_originator() {
        let (map, mut outs) = members(3, 4);
        let origin = outs[0].0;
        let content: Arc<str> = Arc::from("hello");

        let delivery = broadcast(&map, 1, &content, Some(origin));
        assert_eq!(delivery.delivered, 2);
        assert!(delivery.dropped.is_empty());

        for (id, outbound) in outs.iter_mut() {
            if *id == origin {
                continue;
            }
            assert_eq!(
                outbound.recv().await,
                Some(ServerMessage::Update {
                    version: 1,
                    content: Arc::from("hello"),
                })
            );
        }
    }

    #[tokio::test]
    async fn test_broadcast_without_exclude_reaches_all() {
        let (map, _outs) = members(2, 4);
        let delivery = broadcast(&map, 3, &Arc::from("x"), None);
        assert_eq!(delivery.delivered, 2);
    }

    #[tokio::test]
    async fn test_broadcast_reports_overflow() {
        let (map, mut outs) = members(2, 1);
        let slow = outs[0].0;
        let content: Arc<str> = Arc::from("a");

        // Drain the healthy member only
        broadcast(&map, 1, &content, None);
        assert!(outs[1].1.recv().await.is_some());

        let delivery = broadcast(&map, 2, &content, None);
        assert_eq!(delivery.delivered, 1);
        assert_eq!(delivery.dropped, vec![slow]);
        assert!(map[&slow].is_closed());
        assert!(!map[&outs[1].0].is_closed());
    }

    #[tokio::test]
    async fn test_broadcast_empty_room() {
        let delivery = broadcast(&Members::new(), 1, &Arc::from(""), None);
        assert_eq!(delivery, Delivery::default());
    }
}

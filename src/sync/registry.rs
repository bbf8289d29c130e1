//! Registry of live rooms, keyed by passphrase
//!
//! The map is guarded by its own lock, taken for lookup, insert and delete
//! only. `join` and `leave` are serialized through it, so a room is created
//! once per passphrase and removed exactly when its last member leaves.
//! Lock order is always registry, then room.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use super::connection::{Connection, ConnectionId};
use super::room::Room;
use crate::models::{Passphrase, Stats};

pub struct RoomRegistry {
    rooms: Mutex<HashMap<Passphrase, Arc<Room>>>,
    max_content_bytes: usize,
}

impl RoomRegistry {
    pub fn new(max_content_bytes: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            max_content_bytes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Passphrase, Arc<Room>>> {
        self.rooms.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get or create the room for `passphrase` and add `connection` to it.
    ///
    /// The connection's `init` message is queued before this returns.
    pub fn join(&self, passphrase: &Passphrase, connection: Arc<Connection>) -> Arc<Room> {
        let mut rooms = self.lock();
        let room = rooms
            .entry(passphrase.clone())
            .or_insert_with(|| {
                tracing::info!(%passphrase, "Room created");
                Arc::new(Room::new(passphrase.clone(), self.max_content_bytes))
            })
            .clone();
        room.add_member(connection);
        room
    }

    /// Remove `connection` from `room`, dropping the room once it is empty.
    ///
    /// Safe to call more than once. A room registered later under the same
    /// passphrase is never touched.
    pub fn leave(&self, room: &Arc<Room>, connection_id: ConnectionId) {
        let mut rooms = self.lock();
        if room.remove_member(connection_id) > 0 {
            return;
        }

        let registered = rooms
            .get(room.passphrase().as_str())
            .is_some_and(|current| Arc::ptr_eq(current, room));
        if registered {
            rooms.remove(room.passphrase().as_str());
            tracing::info!(passphrase = %room.passphrase(), "Room removed");
        }
    }

    /// Get a room if it exists
    pub fn get(&self, passphrase: &str) -> Option<Arc<Room>> {
        self.lock().get(passphrase).cloned()
    }

    /// Get the number of live rooms
    pub fn room_count(&self) -> usize {
        self.lock().len()
    }

    pub fn stats(&self) -> Stats {
        let rooms = self.lock();
        Stats {
            rooms: rooms.len(),
            connections: rooms.values().map(|room| room.member_count()).sum(),
        }
    }
}

/// A connection's membership in a room.
///
/// Holds only a weak reference to the room; the room owns the membership
/// record. Dropping the guard leaves the room.
pub struct Membership {
    registry: Arc<RoomRegistry>,
    room: Weak<Room>,
    connection_id: ConnectionId,
}

impl Membership {
    /// Join `passphrase` through `registry`
    pub fn join(
        registry: Arc<RoomRegistry>,
        passphrase: &Passphrase,
        connection: Arc<Connection>,
    ) -> Self {
        let connection_id = connection.id();
        let room = registry.join(passphrase, connection);
        Self {
            registry,
            room: Arc::downgrade(&room),
            connection_id,
        }
    }

    /// The joined room, while it is alive
    pub fn room(&self) -> Option<Arc<Room>> {
        self.room.upgrade()
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if let Some(room) = self.room.upgrade() {
            self.registry.leave(&room, self.connection_id);
        }
    }
}

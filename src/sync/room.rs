//! Room for a shared paste
//!
//! A room owns the authoritative content and version of one passphrase and
//! the set of connections joined to it. Every state change and the messages
//! it produces happen under the room's lock, which is never held across an
//! await point.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::connection::{Connection, ConnectionId};
use super::dispatcher::{self, Members};
use super::error::EditError;
use crate::messages::ServerMessage;
use crate::models::{Edit, Passphrase, RoomInfo, Snapshot};

/// Result of applying an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The edit became the new state and was broadcast
    Accepted(Snapshot),
    /// The edit was based on an old version; carries the current state
    Stale(Snapshot),
}

struct RoomState {
    content: Arc<str>,
    version: u64,
    updated_at: DateTime<Utc>,
    members: Members,
}

impl RoomState {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            version: self.version,
            content: Arc::clone(&self.content),
        }
    }
}

pub struct Room {
    passphrase: Passphrase,
    max_content_bytes: usize,
    created_at: DateTime<Utc>,
    state: Mutex<RoomState>,
}

impl Room {
    /// Create an empty room at version 0
    pub fn new(passphrase: Passphrase, max_content_bytes: usize) -> Self {
        let now = Utc::now();
        Self {
            passphrase,
            max_content_bytes,
            created_at: now,
            state: Mutex::new(RoomState {
                content: Arc::from(""),
                version: 0,
                updated_at: now,
                members: Members::new(),
            }),
        }
    }

    pub fn passphrase(&self) -> &Passphrase {
        &self.passphrase
    }

    fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current authoritative state
    pub fn snapshot(&self) -> Snapshot {
        self.lock().snapshot()
    }

    /// Add a member and queue its `init` message.
    ///
    /// The snapshot is queued under the room lock, so the member never sees
    /// an update older than its initial state.
    pub fn add_member(&self, connection: Arc<Connection>) -> Snapshot {
        let mut state = self.lock();
        let snapshot = state.snapshot();
        connection.send(ServerMessage::init(&snapshot));
        state.members.insert(connection.id(), connection);

        tracing::debug!(
            passphrase = %self.passphrase,
            members = state.members.len(),
            version = snapshot.version,
            "Member joined"
        );
        snapshot
    }

    /// Remove a member; returns how many members remain
    pub fn remove_member(&self, connection_id: ConnectionId) -> usize {
        let mut state = self.lock();
        if state.members.remove(&connection_id).is_some() {
            tracing::debug!(
                passphrase = %self.passphrase,
                %connection_id,
                members = state.members.len(),
                "Member left"
            );
        }
        state.members.len()
    }

    pub fn member_count(&self) -> usize {
        self.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().members.is_empty()
    }

    pub fn is_member(&self, connection_id: ConnectionId) -> bool {
        self.lock().members.contains_key(&connection_id)
    }

    /// Apply an edit from `from` with an optimistic version check.
    ///
    /// On a match the content is replaced, the version bumped, every other
    /// member gets an `update` and the submitter an `ack`. On a mismatch only
    /// the submitter hears back, with a `conflict` carrying the current
    /// state.
    pub fn apply_edit(&self, from: &Connection, edit: Edit) -> Result<EditOutcome, EditError> {
        if edit.new_content.len() > self.max_content_bytes {
            return Err(EditError::ContentTooLarge {
                size: edit.new_content.len(),
                limit: self.max_content_bytes,
            });
        }

        let mut state = self.lock();

        if edit.base_version != state.version {
            let current = state.snapshot();
            from.send(ServerMessage::conflict(&current));
            tracing::debug!(
                passphrase = %self.passphrase,
                connection_id = %from.id(),
                base_version = edit.base_version,
                version = current.version,
                "Stale edit rejected"
            );
            return Ok(EditOutcome::Stale(current));
        }

        state.content = Arc::from(edit.new_content);
        state.version += 1;
        state.updated_at = Utc::now();

        let delivery =
            dispatcher::broadcast(&state.members, state.version, &state.content, Some(from.id()));
        from.send(ServerMessage::Ack {
            version: state.version,
        });

        tracing::debug!(
            passphrase = %self.passphrase,
            connection_id = %from.id(),
            version = state.version,
            delivered = delivery.delivered,
            "Edit accepted"
        );
        Ok(EditOutcome::Accepted(state.snapshot()))
    }

    pub fn info(&self) -> RoomInfo {
        let state = self.lock();
        RoomInfo {
            passphrase: self.passphrase.clone(),
            version: state.version,
            content: Arc::clone(&state.content),
            members: state.members.len(),
            created_at: self.created_at,
            updated_at: state.updated_at,
        }
    }
}

//! WebSocket protocol messages

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::models::{Edit, Snapshot};

/// Messages from client to server
///
/// Edits carry no tag so `{base_version, new_content}` is accepted as-is;
/// an extra `"type": "edit"` field is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Edit(Edit),
    Control(ControlMessage),
}

/// Tagged control messages from client to server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Liveness probe, answered with `pong`
    Ping,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Room state on join
    Init { version: u64, content: Arc<str> },
    /// Another member's edit was accepted
    Update { version: u64, content: Arc<str> },
    /// The submitter's own edit was accepted
    Ack { version: u64 },
    /// The submitter's edit was stale; carries the current state
    Conflict { version: u64, content: Arc<str> },
    Pong,
    /// Error occurred
    Error { message: String },
}

impl ServerMessage {
    pub fn init(snapshot: &Snapshot) -> Self {
        ServerMessage::Init {
            version: snapshot.version,
            content: Arc::clone(&snapshot.content),
        }
    }

    pub fn conflict(snapshot: &Snapshot) -> Self {
        ServerMessage::Conflict {
            version: snapshot.version,
            content: Arc::clone(&snapshot.content),
        }
    }

    /// Room version this message reflects, if any
    pub fn version(&self) -> Option<u64> {
        match self {
            ServerMessage::Init { version, .. }
            | ServerMessage::Update { version, .. }
            | ServerMessage::Ack { version }
            | ServerMessage::Conflict { version, .. } => Some(*version),
            ServerMessage::Pong | ServerMessage::Error { .. } => None,
        }
    }
}

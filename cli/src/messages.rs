//! WebSocket message types for the livepaste protocol
//!
//! These types mirror the server's protocol.

use serde::{Deserialize, Serialize};

/// Full replacement of a paste, based on the version the client last saw
#[derive(Debug, Clone, Serialize)]
pub struct Edit {
    pub base_version: u64,
    pub new_content: String,
}

/// Tagged control messages from client to server
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    Ping,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Init { version: u64, content: String },
    Update { version: u64, content: String },
    Ack { version: u64 },
    Conflict { version: u64, content: String },
    Pong,
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_serialization() {
        let edit = Edit {
            base_version: 3,
            new_content: "Hello".to_string(),
        };
        let json: serde_json::Value = serde_json::to_value(&edit).unwrap();
        assert_eq!(json, serde_json::json!({"base_version": 3, "new_content": "Hello"}));
    }

    #[test]
    fn test_ping_serialization() {
        let json = serde_json::to_string(&ControlMessage::Ping).unwrap();
        assert_eq!(json, r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_server_message_deserialization() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"type":"update","version":2,"content":"hi"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Update {
                version: 2,
                content: "hi".to_string(),
            }
        );

        let msg: ServerMessage = serde_json::from_str(r#"{"type":"ack","version":5}"#).unwrap();
        assert_eq!(msg, ServerMessage::Ack { version: 5 });
    }

    #[test]
    fn test_server_message_error_deserialization() {
        let json = r#"{"type": "error", "message": "Edit rate limit exceeded"}"#;
        let msg: ServerMessage = serde_json::from_str(json).unwrap();
        match msg {
            ServerMessage::Error { message } => assert_eq!(message, "Edit rate limit exceeded"),
            _ => panic!("Expected Error"),
        }
    }
}

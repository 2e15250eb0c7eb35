//! Protocol messages for collaborative editing sessions.

use coedit_core::{Document, Operation, Position, Range};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A collaborator's cursor, as reported for presence display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    /// The caret position
    pub position: Position,
    /// The selection, when text is selected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection: Option<Range>,
}

impl CursorState {
    /// A collapsed cursor at a position.
    #[must_use]
    pub fn caret(position: Position) -> Self {
        Self {
            position,
            selection: None,
        }
    }
}

/// A connected collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    /// The collaborator's client id
    pub user_id: Uuid,
    /// Display name, if the client provided one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl UserInfo {
    /// Create a user record.
    #[must_use]
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            name: None,
        }
    }
}

/// Messages a client sends to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Enter a document room.
    Join {
        /// The document to edit
        document_id: String,
        /// The joining client
        client_id: Uuid,
    },
    /// Submit a local operation for sequencing.
    Operation {
        /// The document being edited
        document_id: String,
        /// The submitting client
        client_id: Uuid,
        /// The server version the operation was created against
        version: u64,
        /// The operation itself
        operation: Operation,
    },
    /// Report the local cursor for presence.
    Cursor {
        /// The document being edited
        document_id: String,
        /// The reporting client
        client_id: Uuid,
        /// The cursor state
        cursor: CursorState,
    },
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Join accepted: the authoritative snapshot to seed the replica from.
    Joined {
        /// Current authoritative version
        version: u64,
        /// Authoritative document snapshot
        document: Document,
        /// Collaborators already in the room
        users: Vec<UserInfo>,
    },
    /// The sender's in-flight operation was accepted at this version.
    Ack {
        /// The version assigned to the accepted operation
        version: u64,
    },
    /// Another collaborator's operation, rebased by the server.
    Operation {
        /// The version assigned to the operation
        version: u64,
        /// The rebased operation
        operation: Operation,
    },
    /// A collaborator entered the room.
    UserJoined {
        /// The new collaborator
        user: UserInfo,
    },
    /// A collaborator left the room.
    UserLeft {
        /// The departed collaborator's id
        user_id: Uuid,
    },
    /// A collaborator moved their cursor.
    Cursor {
        /// The reporting collaborator's id
        user_id: Uuid,
        /// The cursor state
        cursor: CursorState,
    },
    /// The server rejected a request.
    Error {
        /// Human-readable reason
        message: String,
    },
}

impl ClientMessage {
    /// The document this message addresses.
    #[must_use]
    pub fn document_id(&self) -> &str {
        match self {
            Self::Join { document_id, .. }
            | Self::Operation { document_id, .. }
            | Self::Cursor { document_id, .. } => document_id,
        }
    }

    /// Serialize to a single JSON line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Serialize(e.to_string()))
    }

    /// Deserialize from a JSON line.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_json(line: &str) -> Result<Self, MessageError> {
        serde_json::from_str(line).map_err(|e| MessageError::Deserialize(e.to_string()))
    }
}

impl ServerMessage {
    /// Serialize to a single JSON line (no trailing newline).
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(|e| MessageError::Serialize(e.to_string()))
    }

    /// Deserialize from a JSON line.
    ///
    /// # Errors
    ///
    /// Returns error if deserialization fails.
    pub fn from_json(line: &str) -> Result<Self, MessageError> {
        serde_json::from_str(line).map_err(|e| MessageError::Deserialize(e.to_string()))
    }
}

/// Errors for message serialization/deserialization.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MessageError {
    /// Serialization failed
    #[error("serialization failed: {0}")]
    Serialize(String),
    /// Deserialization failed
    #[error("deserialization failed: {0}")]
    Deserialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_core::Operation;

    #[test]
    fn operation_message_json_roundtrip() {
        let msg = ClientMessage::Operation {
            document_id: "doc-1".to_string(),
            client_id: Uuid::new_v4(),
            version: 10,
            operation: Operation::insert_text(0, 5, "!"),
        };

        let line = msg.to_json().unwrap();
        assert!(!line.contains('\n'));
        let decoded = ClientMessage::from_json(&line).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn joined_carries_the_snapshot() {
        let msg = ServerMessage::Joined {
            version: 42,
            document: Document::new("doc-1", "Notes"),
            users: vec![UserInfo::new(Uuid::new_v4())],
        };

        let line = msg.to_json().unwrap();
        let decoded = ServerMessage::from_json(&line).unwrap();
        let ServerMessage::Joined {
            version, document, ..
        } = decoded
        else {
            panic!("wrong variant");
        };
        assert_eq!(version, 42);
        assert_eq!(document.blocks.len(), 1);
    }

    #[test]
    fn message_tags_are_snake_case() {
        let msg = ServerMessage::UserLeft {
            user_id: Uuid::new_v4(),
        };
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "user_left");
    }

    #[test]
    fn malformed_lines_decode_to_errors() {
        assert!(ClientMessage::from_json("{\"type\":\"nope\"}").is_err());
        assert!(ServerMessage::from_json("not json").is_err());
    }
}

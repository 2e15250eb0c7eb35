//! The hub task: owner of every room and the system's linearization point.
//!
//! Connections never touch rooms directly; they send commands over an mpsc
//! channel and the single hub task processes them in arrival order. That
//! serialization is the only concurrency control the engine needs — rooms,
//! documents, and transforms are all plain single-threaded values in here.

use crate::persistence::SqliteStore;
use crate::room::Room;
use coedit_core::{Document, Operation};
use coedit_proto::{CursorState, ServerMessage};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Commands connections send to the hub.
#[derive(Debug)]
pub enum HubCommand {
    /// A client wants into a document room.
    Join {
        /// The document to open
        document_id: String,
        /// The joining client
        client_id: Uuid,
        /// Where to deliver this client's server messages
        sender: mpsc::UnboundedSender<ServerMessage>,
    },
    /// A client submitted an operation.
    Operation {
        /// The addressed document
        document_id: String,
        /// The submitting client
        client_id: Uuid,
        /// The version the operation was created against
        version: u64,
        /// The operation
        operation: Operation,
    },
    /// A client reported its cursor.
    Cursor {
        /// The addressed document
        document_id: String,
        /// The reporting client
        client_id: Uuid,
        /// The cursor state
        cursor: CursorState,
    },
    /// A client's connection went away.
    Leave {
        /// The departed client
        client_id: Uuid,
    },
}

/// Owner of all rooms.
pub struct Hub {
    rooms: HashMap<String, Room>,
    memberships: HashMap<Uuid, String>,
    store: Option<SqliteStore>,
}

impl Hub {
    /// Create a hub, optionally backed by a store.
    #[must_use]
    pub fn new(store: Option<SqliteStore>) -> Self {
        Self {
            rooms: HashMap::new(),
            memberships: HashMap::new(),
            store,
        }
    }

    /// Process commands until every sender is gone.
    pub async fn run(mut self, mut rx: mpsc::Receiver<HubCommand>) {
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        tracing::info!("hub shutting down");
    }

    fn handle(&mut self, command: HubCommand) {
        match command {
            HubCommand::Join {
                document_id,
                client_id,
                sender,
            } => {
                self.ensure_room(&document_id);
                if let Some(previous) = self.memberships.insert(client_id, document_id.clone()) {
                    if previous != document_id {
                        if let Some(room) = self.rooms.get_mut(&previous) {
                            room.leave(client_id);
                        }
                    }
                }
                if let Some(room) = self.rooms.get_mut(&document_id) {
                    room.join(client_id, sender);
                }
            }
            HubCommand::Operation {
                document_id,
                client_id,
                version,
                operation,
            } => {
                self.ensure_room(&document_id);
                let Some(room) = self.rooms.get_mut(&document_id) else {
                    return;
                };
                let rebased = room.submit(client_id, version, operation);
                persist(self.store.as_ref(), &document_id, room, &rebased);
            }
            HubCommand::Cursor {
                document_id,
                client_id,
                cursor,
            } => {
                if let Some(room) = self.rooms.get(&document_id) {
                    room.relay_cursor(client_id, cursor);
                }
            }
            HubCommand::Leave { client_id } => {
                if let Some(document_id) = self.memberships.remove(&client_id) {
                    if let Some(room) = self.rooms.get_mut(&document_id) {
                        room.leave(client_id);
                        if room.is_empty() {
                            tracing::debug!(document_id, "closing empty room");
                            self.rooms.remove(&document_id);
                        }
                    }
                }
            }
        }
    }

    /// Open a room if it is not already open, seeding from the store when a
    /// snapshot exists.
    fn ensure_room(&mut self, document_id: &str) {
        if self.rooms.contains_key(document_id) {
            return;
        }
        let (doc, version) = self
            .store
            .as_ref()
            .and_then(|store| match store.load_document(document_id) {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!(error = %err, document_id, "failed to load snapshot");
                    None
                }
            })
            .and_then(|(json, version)| match serde_json::from_str::<Document>(&json) {
                Ok(doc) => Some((doc, version)),
                Err(err) => {
                    tracing::warn!(error = %err, document_id, "stored snapshot is unreadable");
                    None
                }
            })
            .unwrap_or_else(|| (Document::new(document_id, "Untitled"), 0));

        tracing::info!(document_id, version, "opening room");
        self.rooms
            .insert(document_id.to_string(), Room::new(doc, version));
    }
}

fn persist(store: Option<&SqliteStore>, document_id: &str, room: &Room, rebased: &Operation) {
    let Some(store) = store else {
        return;
    };
    let doc = room.document();
    match serde_json::to_string(doc) {
        Ok(snapshot) => {
            if let Err(err) =
                store.save_document(document_id, &doc.title, &snapshot, room.version())
            {
                tracing::warn!(error = %err, document_id, "failed to persist snapshot");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, document_id, "failed to serialize snapshot");
        }
    }
    match serde_json::to_string(rebased) {
        Ok(op_json) => {
            if let Err(err) = store.append_operation(document_id, room.version(), &op_json) {
                tracing::warn!(error = %err, document_id, "failed to persist operation");
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, document_id, "failed to serialize operation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_core::Operation;

    #[tokio::test]
    async fn hub_routes_operations_and_persists_snapshots() {
        let store = SqliteStore::in_memory().unwrap();
        let mut hub = Hub::new(Some(store));

        let client = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        hub.handle(HubCommand::Join {
            document_id: "doc-1".to_string(),
            client_id: client,
            sender: tx,
        });
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::Joined { version: 0, .. }
        ));

        hub.handle(HubCommand::Operation {
            document_id: "doc-1".to_string(),
            client_id: client,
            version: 0,
            operation: Operation::insert_text(0, 0, "hi"),
        });
        assert!(matches!(
            rx.try_recv().unwrap(),
            ServerMessage::Ack { version: 1 }
        ));

        let (json, version) = hub
            .store
            .as_ref()
            .unwrap()
            .load_document("doc-1")
            .unwrap()
            .unwrap();
        assert_eq!(version, 1);
        let doc: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(doc.block_text(0).unwrap(), "hi");
    }

    #[tokio::test]
    async fn rooms_reseed_from_the_store_after_closing() {
        let store = SqliteStore::in_memory().unwrap();
        let mut hub = Hub::new(Some(store));
        let client = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();

        hub.handle(HubCommand::Join {
            document_id: "doc-1".to_string(),
            client_id: client,
            sender: tx,
        });
        hub.handle(HubCommand::Operation {
            document_id: "doc-1".to_string(),
            client_id: client,
            version: 0,
            operation: Operation::insert_text(0, 0, "persisted"),
        });
        hub.handle(HubCommand::Leave { client_id: client });
        assert!(hub.rooms.is_empty());

        // A new join must see the stored snapshot at the stored version.
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        hub.handle(HubCommand::Join {
            document_id: "doc-1".to_string(),
            client_id: Uuid::new_v4(),
            sender: tx2,
        });
        let ServerMessage::Joined { version, document, .. } = rx2.try_recv().unwrap() else {
            panic!("expected joined");
        };
        assert_eq!(version, 1);
        assert_eq!(document.block_text(0).unwrap(), "persisted");
    }

    #[tokio::test]
    async fn joining_a_second_document_leaves_the_first() {
        let mut hub = Hub::new(None);
        let client = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();

        hub.handle(HubCommand::Join {
            document_id: "doc-1".to_string(),
            client_id: client,
            sender: tx.clone(),
        });
        hub.handle(HubCommand::Join {
            document_id: "doc-2".to_string(),
            client_id: client,
            sender: tx,
        });

        assert!(hub.rooms.get("doc-1").unwrap().is_empty());
        assert!(!hub.rooms.get("doc-2").unwrap().is_empty());
    }
}

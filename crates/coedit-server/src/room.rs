//! The per-document sequencing authority.
//!
//! A room holds the authoritative document, a monotonically increasing
//! version, and the ordered history of accepted operations since the room
//! opened. Every submitted operation is rebased against the history tail
//! the submitting client had not yet seen, applied, appended, acked to the
//! sender at the new version, and broadcast to everyone else. Arrival order
//! at the room is the one total order in the system.

use coedit_core::{apply, transform_against_history, Document, Operation};
use coedit_proto::{CursorState, ServerMessage, UserInfo};
use std::collections::HashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// One document room.
pub struct Room {
    doc: Document,
    version: u64,
    /// Version the room was seeded at; history index 0 corresponds to the
    /// operation that produced `base_version + 1`.
    base_version: u64,
    history: Vec<Operation>,
    members: HashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl Room {
    /// Open a room around a seeded document.
    #[must_use]
    pub fn new(doc: Document, version: u64) -> Self {
        Self {
            doc,
            version,
            base_version: version,
            history: Vec::new(),
            members: HashMap::new(),
        }
    }

    /// The authoritative document.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The authoritative version.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the room has no connected members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Add a member: they receive the `joined` snapshot, everyone else a
    /// `user_joined` notice.
    pub fn join(&mut self, client_id: Uuid, sender: mpsc::UnboundedSender<ServerMessage>) {
        let joined = ServerMessage::Joined {
            version: self.version,
            document: self.doc.clone(),
            users: self.members.keys().map(|id| UserInfo::new(*id)).collect(),
        };
        let _ = sender.send(joined);
        self.broadcast_except(client_id, &ServerMessage::UserJoined {
            user: UserInfo::new(client_id),
        });
        self.members.insert(client_id, sender);
        tracing::info!(%client_id, members = self.members.len(), "client joined room");
    }

    /// Remove a member and tell the rest.
    pub fn leave(&mut self, client_id: Uuid) {
        if self.members.remove(&client_id).is_some() {
            self.broadcast_except(client_id, &ServerMessage::UserLeft { user_id: client_id });
            tracing::info!(%client_id, members = self.members.len(), "client left room");
        }
    }

    /// Accept an operation submitted against `client_version`.
    ///
    /// Returns the rebased operation that entered the history, for
    /// persistence.
    pub fn submit(&mut self, client_id: Uuid, client_version: u64, op: Operation) -> Operation {
        let tail_start = usize::try_from(client_version.saturating_sub(self.base_version))
            .unwrap_or(usize::MAX)
            .min(self.history.len());
        let rebased = transform_against_history(&op, &self.history[tail_start..]);

        self.doc = apply(&self.doc, &rebased);
        self.history.push(rebased.clone());
        self.version += 1;

        tracing::debug!(
            %client_id,
            client_version,
            version = self.version,
            rebased_through = self.history.len() - 1 - tail_start,
            "accepted operation"
        );

        if let Some(sender) = self.members.get(&client_id) {
            let _ = sender.send(ServerMessage::Ack {
                version: self.version,
            });
        }
        self.broadcast_except(client_id, &ServerMessage::Operation {
            version: self.version,
            operation: rebased.clone(),
        });

        rebased
    }

    /// Relay a presence cursor to everyone else in the room.
    pub fn relay_cursor(&self, client_id: Uuid, cursor: CursorState) {
        self.broadcast_except(client_id, &ServerMessage::Cursor {
            user_id: client_id,
            cursor,
        });
    }

    fn broadcast_except(&self, except: Uuid, msg: &ServerMessage) {
        for (id, sender) in &self.members {
            if *id != except {
                let _ = sender.send(msg.clone());
            }
        }
    }
}

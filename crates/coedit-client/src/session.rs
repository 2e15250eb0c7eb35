//! The client-side reconciliation state machine.
//!
//! Invariant: at most one operation is in flight to the server at a time.
//! Local edits apply to the replica immediately (latency is hidden from the
//! user) and either become the in-flight operation or queue behind it.
//! Remote operations are rebased through the in-flight operation and the
//! whole buffer, pairwise, before touching the replica — and the in-flight
//! and buffered operations are rebased against the remote one in the same
//! pass, so what we eventually send remains valid on the server's timeline.

use crate::presence::Presence;
use coedit_core::{apply, transform_pair, Document, Operation};
use coedit_proto::{ClientMessage, CursorState, ServerMessage};
use std::collections::VecDeque;
use uuid::Uuid;

/// One client's editing session for one document.
#[derive(Debug)]
pub struct Session {
    document_id: String,
    client_id: Uuid,
    doc: Document,
    server_version: u64,
    inflight: Option<Operation>,
    buffered: VecDeque<Operation>,
    presence: Presence,
    joined: bool,
}

impl Session {
    /// Create a session for a document. The replica is a placeholder until
    /// a `joined` message seeds it.
    #[must_use]
    pub fn new(document_id: impl Into<String>, client_id: Uuid) -> Self {
        let document_id = document_id.into();
        Self {
            doc: Document::new(document_id.clone(), String::new()),
            document_id,
            client_id,
            server_version: 0,
            inflight: None,
            buffered: VecDeque::new(),
            presence: Presence::new(),
            joined: false,
        }
    }

    /// The message that enters the room.
    #[must_use]
    pub fn join_message(&self) -> ClientMessage {
        ClientMessage::Join {
            document_id: self.document_id.clone(),
            client_id: self.client_id,
        }
    }

    /// The local replica.
    #[must_use]
    pub fn document(&self) -> &Document {
        &self.doc
    }

    /// The last server version this session has seen.
    #[must_use]
    pub fn server_version(&self) -> u64 {
        self.server_version
    }

    /// This session's client id.
    #[must_use]
    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    /// Whether every local edit has been acknowledged.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.inflight.is_none()
    }

    /// Whether a `joined` snapshot has seeded the replica.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Number of local edits not yet acknowledged (in flight + buffered).
    #[must_use]
    pub fn pending_len(&self) -> usize {
        usize::from(self.inflight.is_some()) + self.buffered.len()
    }

    /// Remote collaborators and their cursors.
    #[must_use]
    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Record a local edit.
    ///
    /// The replica is updated immediately. Returns the wire message to send
    /// when the session was synced; otherwise the edit is buffered behind
    /// the in-flight operation and nothing is sent yet.
    pub fn local_edit(&mut self, op: Operation) -> Option<ClientMessage> {
        self.doc = apply(&self.doc, &op);
        if self.inflight.is_none() {
            tracing::debug!(version = self.server_version, ?op, "sending local edit");
            self.inflight = Some(op.clone());
            Some(self.operation_message(op))
        } else {
            tracing::debug!(queued = self.buffered.len() + 1, "buffering local edit");
            self.buffered.push_back(op);
            None
        }
    }

    /// The presence message for the local cursor.
    #[must_use]
    pub fn cursor_message(&self, cursor: CursorState) -> ClientMessage {
        ClientMessage::Cursor {
            document_id: self.document_id.clone(),
            client_id: self.client_id,
            cursor,
        }
    }

    /// Feed one server message through the state machine.
    ///
    /// Returns a follow-up message to send, when an ack frees the wire for
    /// the next buffered operation.
    pub fn handle_server_message(&mut self, msg: ServerMessage) -> Option<ClientMessage> {
        match msg {
            ServerMessage::Joined {
                version,
                document,
                users,
            } => {
                tracing::info!(version, users = users.len(), "joined document room");
                self.server_version = version;
                self.doc = document;
                self.inflight = None;
                self.buffered.clear();
                self.presence.seed(users);
                self.joined = true;
                None
            }
            ServerMessage::Ack { version } => self.handle_ack(version),
            ServerMessage::Operation { version, operation } => {
                self.handle_remote(version, operation);
                None
            }
            ServerMessage::UserJoined { user } => {
                self.presence.user_joined(user);
                None
            }
            ServerMessage::UserLeft { user_id } => {
                self.presence.user_left(user_id);
                None
            }
            ServerMessage::Cursor { user_id, cursor } => {
                self.presence.cursor(user_id, cursor);
                None
            }
            ServerMessage::Error { message } => {
                tracing::warn!(message, "server reported an error");
                None
            }
        }
    }

    /// Connection loss: drop unacknowledged local state and presence.
    ///
    /// There is deliberately no durable outbox — in-flight and buffered
    /// edits are discarded, not resent on reconnect.
    pub fn reset(&mut self) {
        tracing::info!(
            dropped = self.pending_len(),
            "connection lost, discarding unacknowledged edits"
        );
        self.inflight = None;
        self.buffered.clear();
        self.presence.clear();
        self.joined = false;
    }

    fn handle_ack(&mut self, version: u64) -> Option<ClientMessage> {
        self.server_version = version;
        if let Some(next) = self.buffered.pop_front() {
            tracing::debug!(version, remaining = self.buffered.len(), "promoting buffered edit");
            self.inflight = Some(next.clone());
            Some(self.operation_message(next))
        } else {
            self.inflight = None;
            None
        }
    }

    fn handle_remote(&mut self, version: u64, mut remote: Operation) {
        self.server_version = version;
        if let Some(inflight) = self.inflight.take() {
            let (inflight, rebased_remote) = transform_pair(&inflight, &remote);
            self.inflight = Some(inflight);
            remote = rebased_remote;
        }
        for buffered in &mut self.buffered {
            let (rebased_local, rebased_remote) = transform_pair(buffered, &remote);
            *buffered = rebased_local;
            remote = rebased_remote;
        }
        tracing::debug!(version, ?remote, "applying remote operation");
        // Remote operations never enter the local undo history and are
        // never re-broadcast; they just land on the replica.
        self.doc = apply(&self.doc, &remote);
    }

    fn operation_message(&self, operation: Operation) -> ClientMessage {
        ClientMessage::Operation {
            document_id: self.document_id.clone(),
            client_id: self.client_id,
            version: self.server_version,
            operation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_core::{Block, Position};
    use coedit_proto::UserInfo;

    fn joined_session(text: &str, version: u64) -> Session {
        let mut session = Session::new("doc-1", Uuid::new_v4());
        let doc = Document::from_blocks("doc-1", "Test", vec![Block::with_text(text)]);
        session.handle_server_message(ServerMessage::Joined {
            version,
            document: doc,
            users: vec![],
        });
        session
    }

    #[test]
    fn local_edits_apply_optimistically_and_send_once() {
        let mut session = joined_session("Hello", 10);

        let first = session.local_edit(Operation::insert_text(0, 5, "!"));
        assert!(first.is_some());
        assert_eq!(session.document().block_text(0).unwrap(), "Hello!");
        assert!(!session.is_synced());

        let second = session.local_edit(Operation::insert_text(0, 6, "?"));
        assert!(second.is_none());
        assert_eq!(session.document().block_text(0).unwrap(), "Hello!?");
        assert_eq!(session.pending_len(), 2);
    }

    #[test]
    fn ack_promotes_the_buffer_head_at_the_new_version() {
        let mut session = joined_session("Hello", 10);
        session.local_edit(Operation::insert_text(0, 5, "!"));
        session.local_edit(Operation::insert_text(0, 6, "?"));

        let followup = session.handle_server_message(ServerMessage::Ack { version: 11 });
        let Some(ClientMessage::Operation {
            version, operation, ..
        }) = followup
        else {
            panic!("expected a follow-up operation message");
        };
        assert_eq!(version, 11);
        assert_eq!(operation, Operation::insert_text(0, 6, "?"));
        assert_eq!(session.server_version(), 11);
        assert!(!session.is_synced());

        let done = session.handle_server_message(ServerMessage::Ack { version: 12 });
        assert!(done.is_none());
        assert!(session.is_synced());
    }

    #[test]
    fn remote_operation_rebases_inflight_and_buffer() {
        // The reconciliation scenario from the protocol design, verbatim.
        let mut session = joined_session("Hello", 10);

        session.local_edit(Operation::insert_text(0, 5, "!"));
        session.local_edit(Operation::insert_text(0, 6, " world"));
        assert_eq!(session.document().block_text(0).unwrap(), "Hello! world");

        session.handle_server_message(ServerMessage::Operation {
            version: 11,
            operation: Operation::insert_text(0, 0, "Bob: "),
        });

        assert_eq!(
            session.document().block_text(0).unwrap(),
            "Bob: Hello! world"
        );
        assert_eq!(session.server_version(), 11);

        // The pending edits were shifted past the remote insert.
        let followup = session.handle_server_message(ServerMessage::Ack { version: 12 });
        let Some(ClientMessage::Operation { operation, .. }) = followup else {
            panic!("expected the buffered edit to be promoted");
        };
        let Operation::InsertText { position, .. } = operation else {
            panic!("buffered edit changed kind");
        };
        assert_eq!(position, Position::new(0, 11));
    }

    #[test]
    fn remote_operations_apply_directly_when_synced() {
        let mut session = joined_session("abc", 3);
        session.handle_server_message(ServerMessage::Operation {
            version: 4,
            operation: Operation::insert_text(0, 3, "d"),
        });
        assert_eq!(session.document().block_text(0).unwrap(), "abcd");
        assert!(session.is_synced());
    }

    #[test]
    fn reset_discards_unacknowledged_state_but_keeps_the_replica() {
        let mut session = joined_session("Hello", 10);
        session.local_edit(Operation::insert_text(0, 5, "!"));
        session.local_edit(Operation::insert_text(0, 6, "?"));
        session.handle_server_message(ServerMessage::UserJoined {
            user: UserInfo::new(Uuid::new_v4()),
        });

        session.reset();

        assert!(session.is_synced());
        assert_eq!(session.pending_len(), 0);
        assert!(session.presence().is_empty());
        assert!(!session.is_joined());
        // The replica keeps the optimistic edits; there is no rollback and
        // no resend.
        assert_eq!(session.document().block_text(0).unwrap(), "Hello!?");
    }

    #[test]
    fn joined_reseeds_the_replica() {
        let mut session = joined_session("old", 1);
        session.local_edit(Operation::insert_text(0, 0, "x"));
        session.handle_server_message(ServerMessage::Joined {
            version: 7,
            document: Document::from_blocks("doc-1", "Test", vec![Block::with_text("new")]),
            users: vec![UserInfo::new(Uuid::new_v4())],
        });
        assert_eq!(session.server_version(), 7);
        assert_eq!(session.document().block_text(0).unwrap(), "new");
        assert!(session.is_synced());
        assert_eq!(session.presence().len(), 1);
    }
}

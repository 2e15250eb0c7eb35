//! Remote-collaborator registry.
//!
//! Tracks who else is in the room and the last cursor each collaborator
//! reported. Resolving cursors against the rendered document is the
//! rendering layer's job; this registry only stores what the wire said.

use coedit_proto::{CursorState, UserInfo};
use std::collections::HashMap;
use uuid::Uuid;

/// A remote collaborator and their last reported cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUser {
    /// Identity as announced by the server
    pub info: UserInfo,
    /// Last reported cursor, if any
    pub cursor: Option<CursorState>,
}

/// The set of remote collaborators in the current room.
#[derive(Debug, Clone, Default)]
pub struct Presence {
    users: HashMap<Uuid, RemoteUser>,
}

impl Presence {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the registry with the roster from a `joined` message.
    pub fn seed(&mut self, users: Vec<UserInfo>) {
        self.users = users
            .into_iter()
            .map(|info| {
                (
                    info.user_id,
                    RemoteUser {
                        info,
                        cursor: None,
                    },
                )
            })
            .collect();
    }

    /// Record a newly joined collaborator.
    pub fn user_joined(&mut self, info: UserInfo) {
        self.users.insert(
            info.user_id,
            RemoteUser {
                info,
                cursor: None,
            },
        );
    }

    /// Drop a departed collaborator.
    pub fn user_left(&mut self, user_id: Uuid) {
        self.users.remove(&user_id);
    }

    /// Record a collaborator's cursor report.
    ///
    /// Reports for unknown users are kept; the roster message can race the
    /// first cursor report.
    pub fn cursor(&mut self, user_id: Uuid, cursor: CursorState) {
        self.users
            .entry(user_id)
            .or_insert_with(|| RemoteUser {
                info: UserInfo::new(user_id),
                cursor: None,
            })
            .cursor = Some(cursor);
    }

    /// Look up one collaborator.
    #[must_use]
    pub fn get(&self, user_id: Uuid) -> Option<&RemoteUser> {
        self.users.get(&user_id)
    }

    /// Iterate over all collaborators.
    pub fn iter(&self) -> impl Iterator<Item = &RemoteUser> {
        self.users.values()
    }

    /// Number of remote collaborators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the room has no other collaborators.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Forget everyone (connection loss).
    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coedit_core::Position;

    #[test]
    fn roster_updates_follow_join_and_leave() {
        let mut presence = Presence::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        presence.seed(vec![UserInfo::new(a)]);
        presence.user_joined(UserInfo::new(b));
        assert_eq!(presence.len(), 2);

        presence.user_left(a);
        assert!(presence.get(a).is_none());
        assert_eq!(presence.len(), 1);
    }

    #[test]
    fn cursor_reports_survive_roster_races() {
        let mut presence = Presence::new();
        let id = Uuid::new_v4();
        presence.cursor(id, CursorState::caret(Position::new(0, 3)));
        assert_eq!(
            presence.get(id).unwrap().cursor.as_ref().unwrap().position,
            Position::new(0, 3)
        );
    }
}

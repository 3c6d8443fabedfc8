//! The room session registry: who is in which room right now.
//!
//! This is the only shared mutable state in the relay. Nothing is
//! persisted; after a restart clients rebuild it by joining again. A room
//! exists only while it has at least one session, and every method takes
//! `&self` so one instance can be shared behind an `Arc`.
//!
//! # Concurrency note
//!
//! Rooms live in a `DashMap`, which shards its keys across independently
//! locked buckets. Every mutation of a room's session set happens while
//! holding that room's entry, so two joins racing on the same room can't
//! lose a session, and emptiness is checked under the same lock that
//! removes the room. Operations on different rooms don't wait on each
//! other beyond a shared shard.
//!
//! No method holds a map guard while calling another method, which is
//! what keeps `DashMap` deadlock-free.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use huddle_protocol::{RoomId, SessionStatus, UserId, UserSession};

/// Process-wide map of room → sessions, keyed by user.
///
/// Construct one at startup and hand an `Arc` of it to every component
/// that needs presence data.
#[derive(Debug, Default)]
pub struct RoomSessionRegistry {
    rooms: DashMap<RoomId, HashMap<UserId, UserSession>>,
}

impl RoomSessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `user_id` as present in `room_id`.
    ///
    /// Re-joining overwrites the existing session in place (new
    /// username, new `joined_at`, status back to connected); it never
    /// duplicates. Creates the room entry if needed.
    ///
    /// Returns the new session's `joined_at`. It is strictly later than
    /// the `joined_at` of any session it replaces, so callers can hold it
    /// as a token for "the session I created".
    pub fn join(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        username: &str,
    ) -> DateTime<Utc> {
        let mut sessions = self.rooms.entry(room_id.clone()).or_default();

        let mut joined_at = Utc::now();
        let rejoin = match sessions.get(user_id) {
            Some(previous) => {
                if joined_at <= previous.joined_at {
                    joined_at = previous.joined_at + TimeDelta::microseconds(1);
                }
                true
            }
            None => false,
        };
        sessions.insert(
            user_id.clone(),
            UserSession::new(user_id.clone(), username, joined_at),
        );

        tracing::debug!(%room_id, %user_id, rejoin, "session registered");
        joined_at
    }

    /// Removes `user_id` from `room_id`. A no-op if either is unknown.
    ///
    /// If this empties the room, the room entry is removed in the same
    /// critical section.
    ///
    /// Returns the removed session, if there was one.
    pub fn leave(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Option<UserSession> {
        self.leave_if(room_id, user_id, |_| true)
    }

    /// Like [`leave`](Self::leave), but only removes the session if
    /// `predicate` accepts it. The check and the removal are atomic, so a
    /// concurrent re-join can't be removed by a stale decision.
    pub fn leave_if(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        predicate: impl FnOnce(&UserSession) -> bool,
    ) -> Option<UserSession> {
        let Entry::Occupied(mut entry) = self.rooms.entry(room_id.clone())
        else {
            return None;
        };

        let accepted = entry.get().get(user_id).is_some_and(predicate);
        if !accepted {
            return None;
        }

        let removed = entry.get_mut().remove(user_id);
        if entry.get().is_empty() {
            entry.remove();
            tracing::debug!(%room_id, "room emptied and pruned");
        }
        removed
    }

    /// Snapshot of the room's sessions, ordered by join time (then user
    /// id). Unknown rooms yield an empty list.
    ///
    /// The returned `Vec` is a copy: later mutations never show through.
    pub fn list_users(&self, room_id: &RoomId) -> Vec<UserSession> {
        let mut sessions: Vec<UserSession> = self
            .rooms
            .get(room_id)
            .map(|set| set.values().cloned().collect())
            .unwrap_or_default();
        sessions.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        sessions
    }

    /// Number of sessions in the room; 0 for unknown rooms.
    pub fn count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, |set| set.len())
    }

    /// Looks up one session.
    pub fn find(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
    ) -> Option<UserSession> {
        self.rooms
            .get(room_id)
            .and_then(|set| set.get(user_id).cloned())
    }

    /// Sets a session's status. A no-op if the session doesn't exist.
    ///
    /// Returns `true` if a session was updated.
    pub fn update_status(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        status: SessionStatus,
    ) -> bool {
        self.update_status_if(room_id, user_id, status, |_| true)
    }

    /// Like [`update_status`](Self::update_status), but only if
    /// `predicate` accepts the current session. Check and update happen
    /// under the room's lock, as in [`leave_if`](Self::leave_if).
    pub fn update_status_if(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        status: SessionStatus,
        predicate: impl FnOnce(&UserSession) -> bool,
    ) -> bool {
        let Some(mut sessions) = self.rooms.get_mut(room_id) else {
            return false;
        };
        match sessions.get_mut(user_id) {
            Some(session) if predicate(session) => {
                session.status = status;
                true
            }
            _ => false,
        }
    }

    /// Number of rooms with at least one session.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Whether the registry currently holds an entry for `room_id`.
    pub fn contains_room(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Ids of all non-empty rooms, in no particular order.
    pub fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.iter().map(|entry| entry.key().clone()).collect()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `RoomSessionRegistry`.
    //!
    //! Naming: `test_{function}_{scenario}_{expected}`.

    use super::*;

    fn room(id: &str) -> RoomId {
        RoomId::new(id)
    }

    fn user(id: &str) -> UserId {
        UserId::new(id)
    }

    // =====================================================================
    // join()
    // =====================================================================

    #[test]
    fn test_join_new_user_creates_room_and_session() {
        let registry = RoomSessionRegistry::new();

        let joined_at = registry.join(&room("r1"), &user("u1"), "Alice");

        assert!(registry.contains_room(&room("r1")));
        assert_eq!(registry.count(&room("r1")), 1);
        let session = registry.find(&room("r1"), &user("u1")).unwrap();
        assert_eq!(session.username, "Alice");
        assert_eq!(session.joined_at, joined_at);
        assert_eq!(session.status, SessionStatus::Connected);
    }

    #[test]
    fn test_join_twice_overwrites_with_latest_username() {
        let registry = RoomSessionRegistry::new();
        let first = registry.join(&room("r1"), &user("u1"), "Alice");

        let second = registry.join(&room("r1"), &user("u1"), "Alicia");

        assert!(second > first);
        assert_eq!(registry.count(&room("r1")), 1);
        let users = registry.list_users(&room("r1"));
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "Alicia");
    }

    #[test]
    fn test_join_resets_pending_status_to_connected() {
        let registry = RoomSessionRegistry::new();
        registry.join(&room("r1"), &user("u1"), "Alice");
        registry.update_status(
            &room("r1"),
            &user("u1"),
            SessionStatus::DisconnectedPending,
        );

        registry.join(&room("r1"), &user("u1"), "Alice");

        let session = registry.find(&room("r1"), &user("u1")).unwrap();
        assert_eq!(session.status, SessionStatus::Connected);
    }

    // =====================================================================
    // leave()
    // =====================================================================

    #[test]
    fn test_leave_last_user_prunes_room() {
        let registry = RoomSessionRegistry::new();
        registry.join(&room("r1"), &user("u1"), "Alice");

        let removed = registry.leave(&room("r1"), &user("u1"));

        assert_eq!(removed.map(|s| s.user_id), Some(user("u1")));
        assert!(registry.list_users(&room("r1")).is_empty());
        assert!(!registry.contains_room(&room("r1")));
        assert!(registry.room_ids().is_empty());
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn test_leave_unknown_room_or_user_is_noop() {
        let registry = RoomSessionRegistry::new();
        assert!(registry.leave(&room("nope"), &user("u1")).is_none());

        registry.join(&room("r1"), &user("u1"), "Alice");
        assert!(registry.leave(&room("r1"), &user("ghost")).is_none());
        assert_eq!(registry.count(&room("r1")), 1);
    }

    #[test]
    fn test_leave_twice_does_not_underflow() {
        let registry = RoomSessionRegistry::new();
        registry.join(&room("r1"), &user("u1"), "Alice");
        registry.join(&room("r1"), &user("u2"), "Bob");

        registry.leave(&room("r1"), &user("u1"));
        registry.leave(&room("r1"), &user("u1"));

        assert_eq!(registry.count(&room("r1")), 1);
    }

    #[test]
    fn test_leave_if_rejecting_predicate_keeps_session() {
        let registry = RoomSessionRegistry::new();
        registry.join(&room("r1"), &user("u1"), "Alice");

        let removed = registry.leave_if(&room("r1"), &user("u1"), |s| {
            s.status == SessionStatus::DisconnectedPending
        });

        assert!(removed.is_none());
        assert_eq!(registry.count(&room("r1")), 1);
    }

    // =====================================================================
    // reads
    // =====================================================================

    #[test]
    fn test_reads_on_unknown_room_return_empty() {
        let registry = RoomSessionRegistry::new();
        assert!(registry.list_users(&room("r1")).is_empty());
        assert_eq!(registry.count(&room("r1")), 0);
        assert!(registry.find(&room("r1"), &user("u1")).is_none());
        // Reads must not create entries.
        assert!(!registry.contains_room(&room("r1")));
    }

    #[test]
    fn test_list_users_is_a_snapshot() {
        let registry = RoomSessionRegistry::new();
        registry.join(&room("r1"), &user("u1"), "Alice");

        let snapshot = registry.list_users(&room("r1"));
        registry.join(&room("r1"), &user("u2"), "Bob");
        registry.leave(&room("r1"), &user("u1"));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].user_id, user("u1"));
    }

    #[test]
    fn test_update_status_unknown_session_is_noop() {
        let registry = RoomSessionRegistry::new();
        assert!(!registry.update_status(
            &room("r1"),
            &user("u1"),
            SessionStatus::DisconnectedPending
        ));
        assert!(!registry.contains_room(&room("r1")));
    }

    #[test]
    fn test_update_status_if_stale_joined_at_leaves_rejoin_connected() {
        let registry = RoomSessionRegistry::new();
        let stale = registry.join(&room("r1"), &user("u1"), "Alice");
        registry.join(&room("r1"), &user("u1"), "Alice");

        let updated = registry.update_status_if(
            &room("r1"),
            &user("u1"),
            SessionStatus::DisconnectedPending,
            |s| s.joined_at == stale,
        );

        assert!(!updated);
        let session = registry.find(&room("r1"), &user("u1")).unwrap();
        assert_eq!(session.status, SessionStatus::Connected);
    }

    #[test]
    fn test_update_status_if_matching_joined_at_updates() {
        let registry = RoomSessionRegistry::new();
        let joined_at = registry.join(&room("r1"), &user("u1"), "Alice");

        assert!(registry.update_status_if(
            &room("r1"),
            &user("u1"),
            SessionStatus::DisconnectedPending,
            |s| s.joined_at == joined_at,
        ));
        let session = registry.find(&room("r1"), &user("u1")).unwrap();
        assert_eq!(session.status, SessionStatus::DisconnectedPending);
    }

    #[test]
    fn test_join_join_leave_scenario() {
        let registry = RoomSessionRegistry::new();
        registry.join(&room("r1"), &user("u1"), "Alice");
        registry.join(&room("r1"), &user("u2"), "Bob");
        registry.leave(&room("r1"), &user("u1"));

        let users = registry.list_users(&room("r1"));
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].user_id, user("u2"));
        assert_eq!(users[0].username, "Bob");
        assert_eq!(registry.count(&room("r1")), 1);
    }
}

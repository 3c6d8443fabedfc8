//! Room lifecycle: joins, leaves, status queries, chat, and what the
//! room is told about each.
//!
//! Per `(room, user)` pair there are two states, absent and present.
//! A join moves to present, a leave to absent, and everything else only
//! reads. Each transition mutates the registry *first* and then takes a
//! roster snapshot, so every event describes the room as it is after the
//! change; in particular the joiner is in its own `USER_JOINED` roster.
//!
//! # Emission order on join
//!
//! ```text
//! registry.join
//!   → USER_JOINED       broadcast  participants
//!   → SYSTEM            broadcast  chat
//!   → ROOM_STATUS       addressed  joiner
//!   → NEW_PARTICIPANT   addressed  each other peer
//!   → DEBUG             broadcast  debug (opt-in)
//! ```
//!
//! Nothing here fails outward. Bad input is dropped with a debug log.
//! Delivery is fire-and-forget and nothing is retried.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use huddle_protocol::{
    Fields, Intent, RoomId, SessionStatus, Topic, UserId, UserSession,
};
use huddle_registry::RoomSessionRegistry;

use crate::{PresenceConfig, PresenceEventBuilder, Publisher, SignalingRouter};

/// Drives membership transitions and emits the resulting events.
///
/// Share one instance behind an `Arc`; every method takes `&self`.
pub struct RoomLifecycleCoordinator<P: Publisher> {
    registry: Arc<RoomSessionRegistry>,
    publisher: Arc<P>,
    presence: PresenceEventBuilder,
    router: SignalingRouter<P>,
}

impl<P: Publisher> RoomLifecycleCoordinator<P> {
    pub fn new(
        registry: Arc<RoomSessionRegistry>,
        publisher: Arc<P>,
        config: PresenceConfig,
    ) -> Self {
        let router = SignalingRouter::new(registry.clone(), publisher.clone());
        Self {
            registry,
            publisher,
            presence: PresenceEventBuilder::new(config),
            router,
        }
    }

    pub fn registry(&self) -> &Arc<RoomSessionRegistry> {
        &self.registry
    }

    /// Dispatches a decoded client intent.
    pub fn handle(&self, intent: Intent) {
        match intent {
            Intent::Join {
                room_id,
                user_id,
                username,
            } => {
                self.join(&room_id, &user_id, &username);
            }
            Intent::Leave {
                room_id,
                user_id,
                username,
            } => self.leave(&room_id, &user_id, username.as_deref()),
            Intent::Signal(msg) => {
                if let Err(e) = self.router.route(msg) {
                    tracing::debug!(error = %e, "signal not forwarded");
                }
            }
            Intent::Chat { room_id, message } => self.chat(&room_id, message),
            Intent::StatusQuery { room_id, user_id } => {
                self.status_query(&room_id, user_id.as_ref())
            }
        }
    }

    /// Adds `user_id` to the room and tells everyone.
    ///
    /// Dropped without any event if a field is empty. Returns the new
    /// session's `joined_at`, which is what
    /// [`mark_disconnected`](Self::mark_disconnected) and
    /// [`leave_session`](Self::leave_session) expect later on.
    pub fn join(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        username: &str,
    ) -> Option<DateTime<Utc>> {
        if room_id.as_str().is_empty()
            || user_id.as_str().is_empty()
            || username.is_empty()
        {
            tracing::debug!(%room_id, %user_id, "join dropped: missing field");
            return None;
        }

        let now = Utc::now();
        let joined_at = self.registry.join(room_id, user_id, username);
        let roster = self.registry.list_users(room_id);
        let count = roster.len();

        self.publisher.broadcast(
            room_id,
            Topic::Participants,
            self.presence
                .user_joined(user_id, username, roster.clone(), now),
        );
        self.publisher.broadcast(
            room_id,
            Topic::Chat,
            self.presence.system_joined(room_id, username, count, now),
        );
        self.publisher.send_to_user(
            user_id,
            self.presence.room_status(roster.clone(), now),
        );
        for peer in roster.iter().filter(|s| &s.user_id != user_id) {
            self.publisher.send_to_user(
                &peer.user_id,
                self.presence.new_participant(room_id, user_id, username, now),
            );
        }
        self.emit_debug("join", room_id, user_id, count, now);

        tracing::info!(%room_id, %user_id, participants = count, "user joined");
        Some(joined_at)
    }

    /// Removes `user_id` from the room and tells everyone.
    ///
    /// `USER_LEFT` goes out even if the user wasn't present. The `SYSTEM`
    /// line only goes out when `username` is given.
    pub fn leave(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        username: Option<&str>,
    ) {
        if room_id.as_str().is_empty() || user_id.as_str().is_empty() {
            tracing::debug!(%room_id, %user_id, "leave dropped: missing field");
            return;
        }

        let removed = self.registry.leave(room_id, user_id);
        if removed.is_none() {
            tracing::debug!(%room_id, %user_id, "leave for absent user");
        }
        self.announce_departure(room_id, user_id, username);
    }

    /// Sends the current roster to `user_id`, or to the whole
    /// participants topic when no user is given.
    pub fn status_query(&self, room_id: &RoomId, user_id: Option<&UserId>) {
        let event = self
            .presence
            .room_status(self.registry.list_users(room_id), Utc::now());
        match user_id {
            Some(user_id) => self.publisher.send_to_user(user_id, event),
            None => {
                self.publisher.broadcast(room_id, Topic::Participants, event)
            }
        }
    }

    /// Relays a chat line to the room's chat topic.
    pub fn chat(&self, room_id: &RoomId, message: Fields) {
        if room_id.as_str().is_empty() {
            tracing::debug!("chat dropped: missing roomId");
            return;
        }
        let count = self.registry.count(room_id);
        self.publisher.broadcast(
            room_id,
            Topic::Chat,
            self.presence.chat(message, count, Utc::now()),
        );
    }

    /// Posts a `SYSTEM` line with arbitrary content to the room's chat.
    pub fn announce(&self, room_id: &RoomId, content: &str) {
        let count = self.registry.count(room_id);
        self.publisher.broadcast(
            room_id,
            Topic::Chat,
            self.presence
                .system_message(room_id, content, count, Utc::now()),
        );
    }

    /// Marks the session created at `joined_at` as pending and pushes
    /// the updated roster to the participants topic.
    ///
    /// A no-op returning `false` if the user isn't in the room or has
    /// re-joined since, in which case the current session belongs to
    /// someone else's connection.
    pub fn mark_disconnected(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        joined_at: DateTime<Utc>,
    ) -> bool {
        if !self.registry.update_status_if(
            room_id,
            user_id,
            SessionStatus::DisconnectedPending,
            |s| s.joined_at == joined_at,
        ) {
            return false;
        }

        let roster = self.registry.list_users(room_id);
        self.publisher.broadcast(
            room_id,
            Topic::Participants,
            self.presence.room_status(roster, Utc::now()),
        );
        tracing::info!(%room_id, %user_id, "user disconnected, pending");
        true
    }

    /// Runs the leave flow for a session that is still pending after its
    /// grace period.
    ///
    /// A no-op if the user re-joined in the meantime (the re-join reset
    /// the status and `joined_at`). Returns `true` if the user was
    /// removed.
    pub fn expire_if_pending(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        joined_at: DateTime<Utc>,
    ) -> bool {
        let expired = self.remove_session(room_id, user_id, |s| {
            s.status == SessionStatus::DisconnectedPending
                && s.joined_at == joined_at
        });
        if expired {
            tracing::info!(%room_id, %user_id, "grace period expired");
        }
        expired
    }

    /// Runs the leave flow for the session created at `joined_at`, with
    /// its stored username. Used when a connection closes and there is no
    /// grace period.
    ///
    /// A no-op if the user has re-joined since. Returns `true` if the
    /// user was removed.
    pub fn leave_session(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        joined_at: DateTime<Utc>,
    ) -> bool {
        self.remove_session(room_id, user_id, |s| s.joined_at == joined_at)
    }

    fn remove_session(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        predicate: impl FnOnce(&UserSession) -> bool,
    ) -> bool {
        let Some(session) = self.registry.leave_if(room_id, user_id, predicate)
        else {
            return false;
        };
        self.announce_departure(room_id, user_id, Some(&session.username));
        true
    }

    /// The post-removal half of a leave.
    fn announce_departure(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        username: Option<&str>,
    ) {
        let now = Utc::now();
        let roster = self.registry.list_users(room_id);
        let count = roster.len();

        self.publisher.broadcast(
            room_id,
            Topic::Participants,
            self.presence.user_left(user_id, username, roster, now),
        );
        if let Some(username) = username {
            self.publisher.broadcast(
                room_id,
                Topic::Chat,
                self.presence.system_left(room_id, username, count, now),
            );
        }
        self.emit_debug("leave", room_id, user_id, count, now);

        tracing::info!(%room_id, %user_id, participants = count, "user left");
    }

    fn emit_debug(
        &self,
        intent: &str,
        room_id: &RoomId,
        user_id: &UserId,
        count: usize,
        at: DateTime<Utc>,
    ) {
        if !self.presence.config().debug_topic {
            return;
        }
        self.publisher.broadcast(
            room_id,
            Topic::Debug,
            self.presence.debug(intent, room_id, user_id, count, at),
        );
    }
}

//! Builds the events that tell a room who is there.
//!
//! Everything here is pure: a roster snapshot and an instant go in, an
//! [`Event`] comes out. Deciding *who* receives an event is the
//! coordinator's job; this module only decides *what* it says.

use chrono::{DateTime, Utc};
use huddle_protocol::{
    DebugEvent, Event, EventKind, Fields, NewParticipantEvent, PresenceEvent,
    RoomId, RoomStatusEvent, SystemEvent, UserId, UserSession,
    format_timestamp,
};
use serde_json::Value;

use crate::PresenceConfig;

/// Constructs presence, roster and system-chat events.
#[derive(Debug, Clone, Default)]
pub struct PresenceEventBuilder {
    config: PresenceConfig,
}

impl PresenceEventBuilder {
    pub fn new(config: PresenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// `USER_JOINED`. `roster` must already include the joiner.
    pub fn user_joined(
        &self,
        user_id: &UserId,
        username: &str,
        roster: Vec<UserSession>,
        at: DateTime<Utc>,
    ) -> Event {
        Event::Presence(PresenceEvent {
            kind: EventKind::UserJoined,
            user_id: user_id.clone(),
            username: Some(username.to_string()),
            timestamp: format_timestamp(at),
            participant_count: roster.len(),
            participants: roster,
        })
    }

    /// `USER_LEFT` carrying the remaining roster.
    pub fn user_left(
        &self,
        user_id: &UserId,
        username: Option<&str>,
        roster: Vec<UserSession>,
        at: DateTime<Utc>,
    ) -> Event {
        Event::Presence(PresenceEvent {
            kind: EventKind::UserLeft,
            user_id: user_id.clone(),
            username: username.map(str::to_string),
            timestamp: format_timestamp(at),
            participant_count: roster.len(),
            participants: roster,
        })
    }

    /// `ROOM_STATUS`.
    pub fn room_status(
        &self,
        roster: Vec<UserSession>,
        at: DateTime<Utc>,
    ) -> Event {
        Event::RoomStatus(RoomStatusEvent {
            kind: EventKind::RoomStatus,
            participant_count: roster.len(),
            participants: roster,
            timestamp: format_timestamp(at),
        })
    }

    /// `SYSTEM` line announcing an arrival.
    pub fn system_joined(
        &self,
        room_id: &RoomId,
        username: &str,
        participant_count: usize,
        at: DateTime<Utc>,
    ) -> Event {
        let content = format!("{username}{}", self.config.joined_suffix);
        self.system_message(room_id, &content, participant_count, at)
    }

    /// `SYSTEM` line announcing a departure.
    pub fn system_left(
        &self,
        room_id: &RoomId,
        username: &str,
        participant_count: usize,
        at: DateTime<Utc>,
    ) -> Event {
        let content = format!("{username}{}", self.config.left_suffix);
        self.system_message(room_id, &content, participant_count, at)
    }

    /// `SYSTEM` line with arbitrary content.
    pub fn system_message(
        &self,
        room_id: &RoomId,
        content: &str,
        participant_count: usize,
        at: DateTime<Utc>,
    ) -> Event {
        Event::System(SystemEvent {
            kind: EventKind::System,
            user_id: self.config.system_user_id.clone(),
            username: self.config.system_username.clone(),
            content: content.to_string(),
            timestamp: format_timestamp(at),
            room_id: room_id.clone(),
            participant_count,
        })
    }

    /// `NEW_PARTICIPANT`, sent to each peer already in the room.
    pub fn new_participant(
        &self,
        room_id: &RoomId,
        user_id: &UserId,
        username: &str,
        at: DateTime<Utc>,
    ) -> Event {
        Event::NewParticipant(NewParticipantEvent {
            kind: EventKind::NewParticipant,
            room_id: room_id.clone(),
            user_id: user_id.clone(),
            username: username.to_string(),
            timestamp: format_timestamp(at),
        })
    }

    /// A client chat line ready for broadcast.
    ///
    /// `timestamp` is filled in only if the client left it out (or sent
    /// null); `participantCount` is always overwritten.
    pub fn chat(
        &self,
        mut message: Fields,
        participant_count: usize,
        at: DateTime<Utc>,
    ) -> Event {
        let has_timestamp =
            message.get("timestamp").is_some_and(|t| !t.is_null());
        if !has_timestamp {
            message.insert(
                "timestamp".to_string(),
                Value::String(format_timestamp(at)),
            );
        }
        message.insert(
            "participantCount".to_string(),
            Value::from(participant_count),
        );
        Event::Chat(message)
    }

    /// `DEBUG` trace of a membership transition.
    pub fn debug(
        &self,
        intent: &str,
        room_id: &RoomId,
        user_id: &UserId,
        participant_count: usize,
        at: DateTime<Utc>,
    ) -> Event {
        Event::Debug(DebugEvent {
            kind: EventKind::Debug,
            intent: intent.to_string(),
            room_id: room_id.clone(),
            user_id: user_id.clone(),
            participant_count,
            timestamp: format_timestamp(at),
        })
    }
}

//! Core identity and presence types shared by every huddle layer.
//!
//! These are the values that show up inside events on the wire (rosters,
//! topics, addresses) and that the registry stores.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Opaque identifier of a room.
///
/// Newtype over `String` so a `RoomId` can never be passed where a
/// `UserId` is expected. `#[serde(transparent)]` keeps the JSON form a
/// plain string: `RoomId("r1")` is `"r1"` on the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a raw room identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque identifier of a participant, stable for as long as the client
/// keeps it. Unique within a room.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw user identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Connection status of a participant inside a room.
///
/// ```text
///   Connected ──(transport closed)──→ DisconnectedPending
///       ↑                                   │
///       └──────────────(re-join)────────────┘
/// ```
///
/// A pending session that is not re-joined within the grace period is
/// removed through the normal leave flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    /// Participant is connected and reachable.
    Connected,
    /// Participant's transport closed; waiting for a re-join.
    DisconnectedPending,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => write!(f, "connected"),
            Self::DisconnectedPending => write!(f, "disconnected-pending"),
        }
    }
}

/// One participant's presence in one room.
///
/// Rosters embedded in events are lists of these. Serialized in
/// camelCase to match what browser clients read:
/// `{"userId", "username", "status", "joinedAt"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    pub user_id: UserId,
    /// Display name, fixed for the lifetime of the session.
    pub username: String,
    pub status: SessionStatus,
    pub joined_at: DateTime<Utc>,
}

impl UserSession {
    /// Creates a connected session stamped with `joined_at`.
    pub fn new(
        user_id: UserId,
        username: impl Into<String>,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            status: SessionStatus::Connected,
            joined_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Addressing
// ---------------------------------------------------------------------------

/// A per-room broadcast channel. Rooms fan out on separate topics so a
/// client can subscribe only to the concerns it renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Roster changes: `USER_JOINED`, `USER_LEFT`, broadcast `ROOM_STATUS`.
    Participants,
    /// Chat lines, including `SYSTEM` announcements.
    Chat,
    /// Opt-in diagnostics mirroring membership transitions.
    Debug,
}

impl Topic {
    /// Path segment used in destinations.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Participants => "participants",
            Self::Chat => "chat",
            Self::Debug => "debug",
        }
    }

    /// Parses the path segment form (`"participants"`, `"chat"`, `"debug"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "participants" => Some(Self::Participants),
            "chat" => Some(Self::Chat),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination path for addressed (one-recipient) delivery.
pub const USER_QUEUE: &str = "/user/queue/events";

/// Where an outbound event goes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Delivery {
    /// Exactly one user's private queue.
    User(UserId),
    /// Every current subscriber of a room topic.
    Room(RoomId, Topic),
}

impl Delivery {
    /// The destination string clients see on each frame, e.g.
    /// `/topic/room/r1/chat` or `/user/queue/events`.
    pub fn destination(&self) -> String {
        match self {
            Self::User(_) => USER_QUEUE.to_string(),
            Self::Room(room_id, topic) => topic_destination(room_id, *topic),
        }
    }
}

/// Builds `/topic/room/{room_id}/{topic}`.
pub fn topic_destination(room_id: &RoomId, topic: Topic) -> String {
    format!("/topic/room/{room_id}/{topic}")
}

/// Formats an instant the way every event timestamp is written:
/// RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

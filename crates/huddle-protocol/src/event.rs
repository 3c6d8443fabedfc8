//! Outbound events: what the relay tells clients.
//!
//! Every event is a JSON object with a `type` discriminator. Presence
//! events use upper-case names (`USER_JOINED`, `ROOM_STATUS`, ...);
//! forwarded signaling keeps the lower-case WebRTC names (`offer`,
//! `answer`, `ice-candidate`) because browsers feed those straight into
//! their peer connection.
//!
//! The shapes are fixed structs, so a field can't be forgotten when an
//! event is built. [`Event`] is the union the publish path carries.

use serde::{Deserialize, Serialize};

use crate::{Fields, RoomId, SignalKind, SignalMessage, UserId, UserSession};

/// The `type` value of presence and system events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    UserJoined,
    UserLeft,
    RoomStatus,
    System,
    NewParticipant,
    Error,
    Welcome,
    Debug,
}

/// Error codes carried by `ERROR` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The addressed signaling target is not in the room.
    UserNotFound,
}

/// `USER_JOINED` / `USER_LEFT`: a membership change plus the resulting
/// roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub user_id: UserId,
    /// Always set on join; on leave only if the client supplied it.
    pub username: Option<String>,
    pub timestamp: String,
    pub participant_count: usize,
    pub participants: Vec<UserSession>,
}

/// `ROOM_STATUS`: the full roster of a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStatusEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub participant_count: usize,
    pub participants: Vec<UserSession>,
    pub timestamp: String,
}

/// `SYSTEM`: a human-readable chat line posted by the relay itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub user_id: String,
    pub username: String,
    pub content: String,
    pub timestamp: String,
    pub room_id: RoomId,
    pub participant_count: usize,
}

/// `NEW_PARTICIPANT`: tells an existing peer that someone arrived, so it
/// can start the offer/answer handshake toward them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewParticipantEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub username: String,
    pub timestamp: String,
}

/// `ERROR`: sent back to the sender of a signaling message that could
/// not be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub error: ErrorCode,
    pub target_user_id: UserId,
}

/// `WELCOME`: handshake acknowledgement on a fresh connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub user_id: UserId,
}

/// `DEBUG`: a trace of a membership transition, for the debug topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub intent: String,
    pub room_id: RoomId,
    pub user_id: UserId,
    pub participant_count: usize,
    pub timestamp: String,
}

/// A signaling message on its way to the target peer: the client's
/// original fields plus `fromUserId` and the canonical `type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalForward {
    #[serde(flatten)]
    pub payload: Fields,
    pub from_user_id: UserId,
    #[serde(rename = "type")]
    pub kind: SignalKind,
}

impl SignalForward {
    /// Stamps a routed message. Any client-supplied `type` or
    /// `fromUserId` is replaced so the recipient can trust both.
    pub fn stamp(msg: SignalMessage) -> Self {
        let mut payload = msg.payload;
        payload.remove("type");
        payload.remove("fromUserId");
        Self {
            payload,
            from_user_id: msg.from_user_id,
            kind: msg.kind,
        }
    }
}

/// Any event the relay publishes.
///
/// Untagged: each variant's struct already carries its own `type` field,
/// so the enum adds no wrapper on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Presence(PresenceEvent),
    RoomStatus(RoomStatusEvent),
    System(SystemEvent),
    NewParticipant(NewParticipantEvent),
    Error(ErrorEvent),
    Welcome(WelcomeEvent),
    Debug(DebugEvent),
    Signal(SignalForward),
    /// A client chat line, relayed as a plain object.
    Chat(Fields),
}

impl Event {
    /// The `type` this event carries, for logging.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Presence(e) => match e.kind {
                EventKind::UserLeft => "USER_LEFT",
                _ => "USER_JOINED",
            },
            Self::RoomStatus(_) => "ROOM_STATUS",
            Self::System(_) => "SYSTEM",
            Self::NewParticipant(_) => "NEW_PARTICIPANT",
            Self::Error(_) => "ERROR",
            Self::Welcome(_) => "WELCOME",
            Self::Debug(_) => "DEBUG",
            Self::Signal(e) => e.kind.as_str(),
            Self::Chat(fields) => fields
                .get("type")
                .and_then(|t| t.as_str())
                .unwrap_or("CHAT"),
        }
    }
}

/// What actually goes over the socket: an event plus the destination it
/// was published to, so a single connection can demultiplex topics.
///
/// ```json
/// { "destination": "/topic/room/r1/chat", "body": { "type": "SYSTEM", ... } }
/// ```
#[derive(Debug, Serialize)]
pub struct OutboundFrame<'a> {
    pub destination: String,
    pub body: &'a Event,
}

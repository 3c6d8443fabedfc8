//! Inbound messages: what clients ask the relay to do.
//!
//! On the wire every inbound frame is a loosely typed JSON object with an
//! `"intent"` key naming the operation:
//!
//! ```json
//! { "intent": "join", "roomId": "r1", "userId": "u1", "username": "Alice" }
//! ```
//!
//! This module turns that map into a typed [`Inbound`] value at the
//! boundary. Required fields are checked once, here, so nothing past this
//! point ever reads a "maybe missing" key. Fields the relay does not
//! interpret (SDP bodies, ICE candidates, chat content) travel along in a
//! [`Fields`] map untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ProtocolError, RoomId, Topic, UserId};

/// A JSON object, kept as-is for pass-through payloads.
pub type Fields = serde_json::Map<String, Value>;

/// The key that selects the operation in every inbound frame.
pub const INTENT_KEY: &str = "intent";

// ---------------------------------------------------------------------------
// Signaling
// ---------------------------------------------------------------------------

/// The three point-to-point signaling message kinds.
///
/// Serialized with the WebRTC spelling: `offer`, `answer`,
/// `ice-candidate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// The canonical `type` stamped onto forwarded messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice-candidate",
        }
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An offer, answer, or ICE candidate addressed to one peer.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalMessage {
    pub kind: SignalKind,
    pub room_id: RoomId,
    pub from_user_id: UserId,
    pub target_user_id: UserId,
    /// Every field the client sent except `intent`, forwarded verbatim.
    pub payload: Fields,
}

// ---------------------------------------------------------------------------
// Intents
// ---------------------------------------------------------------------------

/// A room or signaling operation requested by a client.
///
/// Each variant holds exactly the fields its operation needs; optional
/// fields are `Option`s. A value of this type is always complete.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    /// Enter a room (or refresh an existing presence).
    Join {
        room_id: RoomId,
        user_id: UserId,
        username: String,
    },

    /// Leave a room. Without `username` no chat announcement is made.
    Leave {
        room_id: RoomId,
        user_id: UserId,
        username: Option<String>,
    },

    /// Offer, answer, or ICE candidate for a single peer.
    Signal(SignalMessage),

    /// A chat line, broadcast verbatim to the room's chat topic.
    Chat { room_id: RoomId, message: Fields },

    /// Ask for the current roster. Addressed to `user_id` when present,
    /// otherwise broadcast to the room.
    StatusQuery {
        room_id: RoomId,
        user_id: Option<UserId>,
    },
}

impl Intent {
    /// Short name used in logs and debug events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave { .. } => "leave",
            Self::Signal(msg) => msg.kind.as_str(),
            Self::Chat { .. } => "chat",
            Self::StatusQuery { .. } => "status-query",
        }
    }

    /// The room this intent targets.
    pub fn room_id(&self) -> &RoomId {
        match self {
            Self::Join { room_id, .. }
            | Self::Leave { room_id, .. }
            | Self::Chat { room_id, .. }
            | Self::StatusQuery { room_id, .. } => room_id,
            Self::Signal(msg) => &msg.room_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Connection control
// ---------------------------------------------------------------------------

/// Frames that manage the connection itself rather than a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Control {
    /// First frame on a connection: binds it to a user for addressed
    /// delivery.
    Hello { user_id: UserId },

    /// Start receiving broadcasts on a room topic.
    Subscribe { room_id: RoomId, topic: Topic },

    /// Stop receiving broadcasts on a room topic.
    Unsubscribe { room_id: RoomId, topic: Topic },
}

/// Any decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Control(Control),
    Intent(Intent),
}

impl Inbound {
    /// Decodes a JSON object into a typed frame.
    ///
    /// Intent names follow the short form (`join`, `offer`, ...); the
    /// dotted destination names older clients use (`room.join`,
    /// `webrtc.offer`, `chat.send`, ...) are accepted as aliases.
    ///
    /// # Errors
    /// - [`ProtocolError::MissingField`] if `intent` or a required field
    ///   is absent, not a string, or empty.
    /// - [`ProtocolError::UnknownIntent`] for an unrecognized intent.
    /// - [`ProtocolError::InvalidMessage`] for an unknown topic name.
    pub fn from_fields(mut fields: Fields) -> Result<Self, ProtocolError> {
        let intent = match fields.remove(INTENT_KEY) {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Err(ProtocolError::MissingField(INTENT_KEY)),
        };

        let inbound = match intent.as_str() {
            "hello" => Self::Control(Control::Hello {
                user_id: UserId::new(required(&fields, "userId")?),
            }),
            "subscribe" => {
                let (room_id, topic) = topic_fields(&fields)?;
                Self::Control(Control::Subscribe { room_id, topic })
            }
            "unsubscribe" => {
                let (room_id, topic) = topic_fields(&fields)?;
                Self::Control(Control::Unsubscribe { room_id, topic })
            }
            "join" | "room.join" => Self::Intent(Intent::Join {
                room_id: RoomId::new(required(&fields, "roomId")?),
                user_id: UserId::new(required(&fields, "userId")?),
                username: required(&fields, "username")?,
            }),
            "leave" | "room.leave" => Self::Intent(Intent::Leave {
                room_id: RoomId::new(required(&fields, "roomId")?),
                user_id: UserId::new(required(&fields, "userId")?),
                username: optional(&fields, "username"),
            }),
            "offer" | "webrtc.offer" => signal(SignalKind::Offer, fields)?,
            "answer" | "webrtc.answer" => signal(SignalKind::Answer, fields)?,
            "ice-candidate" | "webrtc.ice-candidate" => {
                signal(SignalKind::IceCandidate, fields)?
            }
            "chat" | "chat.send" => {
                let room_id = RoomId::new(required(&fields, "roomId")?);
                Self::Intent(Intent::Chat {
                    room_id,
                    message: fields,
                })
            }
            "status-query" | "room.status" => {
                Self::Intent(Intent::StatusQuery {
                    room_id: RoomId::new(required(&fields, "roomId")?),
                    user_id: optional(&fields, "userId").map(UserId::new),
                })
            }
            other => {
                return Err(ProtocolError::UnknownIntent(other.to_string()));
            }
        };

        Ok(inbound)
    }
}

impl TryFrom<Fields> for Inbound {
    type Error = ProtocolError;

    fn try_from(fields: Fields) -> Result<Self, Self::Error> {
        Self::from_fields(fields)
    }
}

fn signal(kind: SignalKind, fields: Fields) -> Result<Inbound, ProtocolError> {
    let room_id = RoomId::new(required(&fields, "roomId")?);
    // Older clients send the sender as `userId`.
    let from_user_id = optional(&fields, "fromUserId")
        .or_else(|| optional(&fields, "userId"))
        .map(UserId::new)
        .ok_or(ProtocolError::MissingField("fromUserId"))?;
    let target_user_id = UserId::new(required(&fields, "targetUserId")?);

    Ok(Inbound::Intent(Intent::Signal(SignalMessage {
        kind,
        room_id,
        from_user_id,
        target_user_id,
        payload: fields,
    })))
}

fn topic_fields(fields: &Fields) -> Result<(RoomId, Topic), ProtocolError> {
    let room_id = RoomId::new(required(fields, "roomId")?);
    let name = required(fields, "topic")?;
    let topic = Topic::parse(&name).ok_or_else(|| {
        ProtocolError::InvalidMessage(format!("unknown topic `{name}`"))
    })?;
    Ok((room_id, topic))
}

/// Reads a non-empty string field or reports it missing.
fn required(
    fields: &Fields,
    key: &'static str,
) -> Result<String, ProtocolError> {
    optional(fields, key).ok_or(ProtocolError::MissingField(key))
}

/// Reads a non-empty string field. Non-string values count as absent.
fn optional(fields: &Fields, key: &str) -> Option<String> {
    match fields.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

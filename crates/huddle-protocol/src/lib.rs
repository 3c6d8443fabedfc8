//! Wire protocol for the huddle signaling relay.
//!
//! This crate defines the "language" browsers and the relay speak:
//!
//! - **Types** ([`RoomId`], [`UserId`], [`UserSession`], [`Topic`],
//!   [`Delivery`]): identities, presence records, and addressing.
//! - **Intents** ([`Inbound`], [`Intent`], [`Control`]): what clients
//!   ask for, decoded from loosely typed JSON objects at the boundary.
//! - **Events** ([`Event`] and its shapes): what the relay publishes.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, bytes out.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (bytes) → Protocol (Inbound / Event) → Room (registry, routing)
//! ```
//!
//! Nothing here knows about connections or room state.

mod codec;
mod error;
mod event;
mod intent;
mod types;

pub use codec::{Codec, JsonCodec, decode_inbound};
pub use error::ProtocolError;
pub use event::{
    DebugEvent, ErrorCode, ErrorEvent, Event, EventKind, NewParticipantEvent,
    OutboundFrame, PresenceEvent, RoomStatusEvent, SignalForward, SystemEvent,
    WelcomeEvent,
};
pub use intent::{
    Control, Fields, INTENT_KEY, Inbound, Intent, SignalKind, SignalMessage,
};
pub use types::{
    Delivery, RoomId, SessionStatus, Topic, USER_QUEUE, UserId, UserSession,
    format_timestamp, topic_destination,
};

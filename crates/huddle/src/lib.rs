//! # Huddle
//!
//! Signaling and presence relay for small WebRTC conferences.
//!
//! Clients connect over WebSocket, say `hello`, subscribe to the room
//! topics they care about and send intents (`join`, `leave`, `signal`,
//! `chat`, `status`). The relay keeps the per-room roster, broadcasts
//! presence changes, and forwards SDP offers, answers and ICE candidates
//! between peers. Media never passes through it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use huddle::prelude::*;
//!
//! # async fn start() -> Result<(), HuddleError> {
//! let server = HuddleServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(MemoryRoomDirectory::new())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod hub;
mod server;

pub use config::{
    ConfigError, DEFAULT_BIND_ADDRESS, DEFAULT_DISCONNECT_GRACE_SECONDS,
    DEFAULT_HANDSHAKE_TIMEOUT_SECONDS, DEFAULT_IDLE_TIMEOUT_SECONDS,
    ServerConfig,
};
pub use error::HuddleError;
pub use hub::{Hub, Outbox};
pub use server::{HuddleServer, HuddleServerBuilder};

/// Common imports for running and embedding the relay.
///
/// ```rust
/// use huddle::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ConfigError, HuddleError, HuddleServer, HuddleServerBuilder, Hub,
        ServerConfig,
    };

    pub use huddle_protocol::{
        Codec, Event, EventKind, Intent, JsonCodec, ProtocolError, RoomId,
        SessionStatus, SignalKind, SignalMessage, Topic, UserId, UserSession,
    };
    pub use huddle_registry::{
        MemoryRoomDirectory, NewRoom, Room, RoomDirectory, RoomSessionRegistry,
    };
    pub use huddle_room::{
        PresenceConfig, PresenceEventBuilder, Publisher,
        RoomLifecycleCoordinator, SignalingRouter,
    };
    pub use huddle_transport::TransportError;
}

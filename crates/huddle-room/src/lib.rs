//! Room behavior for the huddle signaling relay.
//!
//! Sits between the presence state and whatever delivers events to
//! clients. It decides which events a client intent produces and who
//! receives them.
//!
//! # Key types
//!
//! - [`RoomLifecycleCoordinator`]: join/leave state machine and the
//!   entry point for every decoded [`Intent`](huddle_protocol::Intent)
//! - [`SignalingRouter`]: offer/answer/candidate forwarding
//! - [`PresenceEventBuilder`]: pure construction of presence events
//! - [`Publisher`]: the delivery seam, implemented by the server's hub
//! - [`PresenceConfig`]: system-line wording and the debug topic switch

mod config;
mod coordinator;
mod error;
mod presence;
mod publish;
mod signaling;

pub use config::PresenceConfig;
pub use coordinator::RoomLifecycleCoordinator;
pub use error::RoomError;
pub use presence::PresenceEventBuilder;
pub use publish::Publisher;
pub use signaling::SignalingRouter;

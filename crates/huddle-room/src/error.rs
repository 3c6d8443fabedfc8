//! Error types for the room layer.

use huddle_protocol::{RoomId, UserId};

/// Errors that can occur while routing room traffic.
///
/// None of these ever reach a client connection. The coordinator logs
/// them and moves on; the router has already told the sender by the time
/// it returns one.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// An offer was addressed to a user who isn't in the room. The sender
    /// received an `ERROR` event instead of the forward.
    #[error("user {target_user_id} not found in room {room_id}")]
    TargetNotFound {
        room_id: RoomId,
        target_user_id: UserId,
    },
}

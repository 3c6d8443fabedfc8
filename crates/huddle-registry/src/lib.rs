//! Presence state for the huddle signaling relay.
//!
//! 1. **Session registry**: who is in which room right now
//!    ([`RoomSessionRegistry`]). In memory, pruned as rooms empty.
//! 2. **Room directory**: which rooms have been created and how to find
//!    them by invite code ([`RoomDirectory`] trait,
//!    [`MemoryRoomDirectory`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Room Layer (above)  ← reads rosters, records joins and leaves
//!     ↕
//! Registry Layer (this crate)  ← owns the presence state
//!     ↕
//! Protocol Layer (below)  ← provides RoomId, UserId, UserSession
//! ```

#![allow(async_fn_in_trait)]

mod directory;
mod error;
mod registry;

pub use directory::{
    DEFAULT_MAX_PARTICIPANTS, MemoryRoomDirectory, NewRoom, Room,
    RoomDirectory,
};
pub use error::DirectoryError;
pub use registry::RoomSessionRegistry;

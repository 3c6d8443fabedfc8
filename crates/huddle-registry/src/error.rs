//! Error types for the room directory.

/// Errors returned by a [`RoomDirectory`](crate::RoomDirectory).
///
/// The session registry itself has no error cases: joining, leaving and
/// reading unknown rooms are all well-defined no-ops.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The room name was empty or only whitespace.
    #[error("room name must not be blank")]
    InvalidName,

    /// A room must admit at least one participant.
    #[error("max participants must be at least 1, got {0}")]
    InvalidCapacity(usize),

    /// Could not find an unused id or invite code after several draws.
    #[error("could not allocate a unique {0}")]
    Exhausted(&'static str),
}

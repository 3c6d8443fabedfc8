//! Unified error type for the huddle relay.

use huddle_protocol::ProtocolError;
use huddle_registry::DirectoryError;
use huddle_room::RoomError;
use huddle_transport::TransportError;

use crate::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates the `From` impls,
/// so `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HuddleError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, bad handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (signaling target not found).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A room directory error (invalid room parameters).
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Reading socket metadata failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

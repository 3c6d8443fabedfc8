//! Error types for the protocol layer.
//!
//! Each huddle crate defines its own error enum. A `ProtocolError` always
//! means the problem is in turning bytes into a typed message (or back),
//! never in routing or room state.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (Rust value → bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, or JSON that is not an
    /// object.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A required key is absent, not a string, or empty.
    ///
    /// The intent carrying it is dropped; nothing is sent back.
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    /// The `intent` key names something this relay does not handle.
    #[error("unknown intent `{0}`")]
    UnknownIntent(String),

    /// The message passed decoding but breaks a protocol rule, such as
    /// subscribing to a topic that does not exist.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

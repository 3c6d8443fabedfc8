//! Codec trait and implementations for serializing/deserializing frames.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The relay only needs something that implements [`Codec`]; the server
//! is generic over it. [`JsonCodec`] is what browsers speak.

use serde::{Serialize, de::DeserializeOwned};

use crate::{Fields, Inbound, ProtocolError};

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because one codec instance is shared by every
/// connection task and by the publish path.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or
    /// don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// Decodes one inbound frame: bytes → JSON object → typed [`Inbound`].
///
/// # Errors
/// `Decode` if the bytes are not a JSON object, otherwise whatever
/// [`Inbound::from_fields`] reports.
pub fn decode_inbound<C: Codec>(
    codec: &C,
    data: &[u8],
) -> Result<Inbound, ProtocolError> {
    let fields: Fields = codec.decode(data)?;
    Inbound::from_fields(fields)
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ## Example
///
/// ```rust
/// use huddle_protocol::{Codec, Inbound, Intent, JsonCodec, decode_inbound};
///
/// let codec = JsonCodec;
/// let bytes = br#"{"intent":"status-query","roomId":"r1"}"#;
///
/// let inbound = decode_inbound(&codec, bytes).unwrap();
/// assert!(matches!(inbound, Inbound::Intent(Intent::StatusQuery { .. })));
///
/// let encoded = codec.encode(&serde_json::json!({"ok": true})).unwrap();
/// assert_eq!(encoded, br#"{"ok":true}"#);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

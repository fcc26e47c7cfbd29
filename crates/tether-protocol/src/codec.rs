//! Turning coordinator envelopes into relay payloads and back.
//!
//! Relays carry bytes. Which wire format the session uses is a deployment
//! choice, so the wiring is generic over [`Codec`] and defaults to
//! [`JsonCodec`].

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Wire format for coordinator traffic.
///
/// Shared between the wiring task and whatever spawns it, hence
/// `Send + Sync + 'static`. Every peer in a room must agree on the codec.
pub trait Codec: Send + Sync + 'static {
    /// Produces the relay payload for `value`.
    ///
    /// # Errors
    /// [`ProtocolError::Encode`] when the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Reads a `T` back from a relay payload.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] for truncated payloads, foreign traffic
    /// on the same channel, or a peer speaking another schema.
    fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, ProtocolError>;
}

/// JSON on the wire, through `serde_json`.
///
/// A join or departure produces at most three small envelopes, and JSON
/// keeps them legible in relay traces.
///
/// ```rust
/// use tether_protocol::{Codec, CoordinatorMessage, Envelope, JsonCodec, PeerId};
///
/// let update = Envelope {
///     seq: 4,
///     message: CoordinatorMessage::FallbackHost { fallback: Some(PeerId(3)) },
/// };
/// let payload = JsonCodec.encode(&update).unwrap();
/// let back: Envelope = JsonCodec.decode(&payload).unwrap();
/// assert_eq!(back, update);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, payload: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(payload).map_err(ProtocolError::Decode)
    }
}

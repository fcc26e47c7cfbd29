//! Error types for the protocol layer.
//!
//! Each crate in Tether defines its own error enum. When you see a
//! `ProtocolError`, the problem is in encoding or decoding a coordinator
//! message, not in the relay connection or the election itself.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an envelope into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning relay bytes into an envelope).
    ///
    /// Common causes: a non-coordinator payload on the same relay channel,
    /// a truncated message, or a peer running an incompatible build.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded but violates protocol rules, e.g. an envelope
    /// with sequence number 0.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

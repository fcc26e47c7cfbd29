//! Core protocol types: peer identity, addressing, and coordinator RPCs.
//!
//! Everything here travels between peers through the relay's ordered,
//! reliable RPC primitive. There is no framing of our own; the relay
//! delivers whole messages.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// A relay-assigned identifier for one peer connection.
///
/// Newtype over `u64` so a peer id can't be confused with a sequence
/// number or a room size. The relay hands out a fresh id for every
/// connection, so a peer that reconnects after a migration gets a new one.
///
/// `Ord` is derived on purpose: the fallback-host election is
/// "lowest id wins", so the total order of `PeerId` IS the election rule.
///
/// `#[serde(transparent)]` serializes `PeerId(7)` as plain `7`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub u64);

/// `tracing::info!(%peer, "joined")` prints "peer-7".
impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Recipient
// ---------------------------------------------------------------------------

/// Who should receive an outgoing RPC.
///
/// The session coordinator returns a list of `(Recipient, Envelope)` pairs
/// and the caller hands each pair to the relay: "everyone" for a changed
/// fallback, "one peer" to catch a newly joined peer up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Recipient {
    /// Every other peer in the room.
    All,

    /// Exactly one peer.
    Peer(PeerId),
}

impl Recipient {
    /// Returns `true` if a message addressed this way reaches `peer`.
    ///
    /// The sender itself is never a recipient; the relay doesn't loop
    /// messages back.
    pub fn includes(&self, peer: PeerId, sender: PeerId) -> bool {
        if peer == sender {
            return false;
        }
        match self {
            Self::All => true,
            Self::Peer(target) => *target == peer,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator messages
// ---------------------------------------------------------------------------

/// Messages sent by the host's session coordinator to its replicas.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON such as
/// `{ "type": "FallbackHost", "fallback": 3 }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CoordinatorMessage {
    /// Host → peers: "this peer takes over if I disappear".
    /// `None` means no non-host peer is connected.
    FallbackHost { fallback: Option<PeerId> },

    /// Host → one peer: the session's shared communication-channel name.
    /// Set once when the host creates the session, never changed after.
    ChannelName { name: String },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A coordinator message stamped with the host's sequence number.
///
/// The host increments `seq` for every RPC it sends during one session.
/// Replicas remember the highest `seq` applied and drop anything older,
/// so a fallback update can never be overwritten by a stale one even if
/// the relay's per-sender ordering is weaker than advertised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-session, strictly increasing, starts at 1.
    pub seq: u64,

    /// The payload.
    pub message: CoordinatorMessage,
}

impl Envelope {
    /// Checks protocol-level rules that deserialization can't express.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidMessage`] for `seq == 0` or an empty
    /// channel name.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.seq == 0 {
            return Err(ProtocolError::InvalidMessage(
                "envelope sequence numbers start at 1".into(),
            ));
        }
        if let CoordinatorMessage::ChannelName { name } = &self.message {
            if name.is_empty() {
                return Err(ProtocolError::InvalidMessage(
                    "channel name must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

// =========================================================================
// Tests
// =========================================================================

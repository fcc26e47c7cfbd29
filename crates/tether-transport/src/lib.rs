//! Relay abstraction layer for Tether.
//!
//! Peers never talk to each other directly: every connection goes through a
//! relay service that owns rooms, assigns [`PeerId`]s, and forwards RPCs.
//! This crate provides the [`Relay`] trait the connection state machine
//! drives, the [`RelayEvent`]s it reacts to, and an in-process relay used
//! by tests and demos.
//!
//! # Feature Flags
//!
//! - `local` (default): [`RelayHub`] / [`LocalRelay`], an in-memory relay

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "local")]
mod local;

pub use error::TransportError;
#[cfg(feature = "local")]
pub use local::{LocalRelay, RelayHub};

use std::fmt;
use std::future::Future;

use tether_protocol::{PeerId, Recipient};

// ---------------------------------------------------------------------------
// RoomSpec
// ---------------------------------------------------------------------------

/// A room on the relay, identified by region plus name.
///
/// The same name may exist independently in two regions; "room name
/// conflict" only happens within one region.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomSpec {
    /// Human-chosen room name, e.g. `"R1"`.
    pub name: String,
    /// Relay region code, e.g. `"eu"`.
    pub region: String,
}

impl RoomSpec {
    /// Creates a room spec from anything string-like.
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for RoomSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.name)
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Why a connection ended (ours, or another peer's).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The local side asked for it via [`Relay::shutdown`]. When this
    /// arrives while nothing was waiting for a disconnect it is a stray
    /// echo, not a failure.
    LocalShutdown,
    /// A host start named a room that another host already owns.
    RoomNameConflict,
    /// A client start named a room that nobody hosts.
    RoomNotFound,
    /// The room has no free peer slots.
    RoomFull,
    /// The room's host went away, taking the room with it.
    HostLeft,
    /// The relay stopped hearing from this connection.
    Timeout,
    /// Anything else the relay reports, kept verbatim for logs.
    Other(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LocalShutdown => write!(f, "local shutdown"),
            Self::RoomNameConflict => write!(f, "room name conflict"),
            Self::RoomNotFound => write!(f, "room not found"),
            Self::RoomFull => write!(f, "room full"),
            Self::HostLeft => write!(f, "host left"),
            Self::Timeout => write!(f, "timeout"),
            Self::Other(reason) => write!(f, "{reason}"),
        }
    }
}

/// Everything the relay tells an endpoint, in delivery order.
///
/// Connect/disconnect events are at-least-once: consumers must tolerate a
/// repeated `Connected`, `PeerConnected` or `Disconnected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// Our start request succeeded; the relay assigned us `local_id`.
    Connected { local_id: PeerId },

    /// Our connection ended (or a start request was refused).
    Disconnected(DisconnectReason),

    /// Another peer joined the room we host.
    PeerConnected(PeerId),

    /// Another peer left the room we host.
    PeerDisconnected(PeerId, DisconnectReason),

    /// The room's master (host) is gone. Always followed by our own
    /// `Disconnected(HostLeft)`.
    MasterSwitched,

    /// An RPC from another peer in the room.
    Message { from: PeerId, data: Vec<u8> },
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

/// The local endpoint of a relay service.
///
/// Requests only report whether the relay *accepted* them; outcomes
/// arrive later as [`RelayEvent`]s on the channel handed out together with
/// the relay. Returned futures are `Send` so a connection actor owning a
/// relay can run on any Tokio worker.
pub trait Relay: Send + Sync + 'static {
    /// Asks the relay to create `room` with us as its host.
    fn start_host(
        &self,
        room: &RoomSpec,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Asks the relay to join `room` as a client. `payload` is the opaque
    /// connect payload the host may inspect.
    fn start_client(
        &self,
        room: &RoomSpec,
        payload: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Connects to the region's lobby (matchmaking presence, no room).
    fn join_lobby(
        &self,
        region: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Drops whatever connection this endpoint holds. Always answered by
    /// `Disconnected(LocalShutdown)`, even when nothing was connected.
    fn shutdown(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends an ordered, reliable RPC to other peers in our room.
    fn send(
        &self,
        to: Recipient,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Our id on the current connection, if any.
    fn local_peer(&self) -> Option<PeerId>;

    /// Every other peer currently in our room.
    fn connected_peers(&self) -> Vec<PeerId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_spec_display_includes_region() {
        assert_eq!(RoomSpec::new("R1", "eu").to_string(), "eu/R1");
    }

    #[test]
    fn test_room_spec_same_name_different_region_not_equal() {
        assert_ne!(RoomSpec::new("R1", "eu"), RoomSpec::new("R1", "us"));
    }

    #[test]
    fn test_disconnect_reason_display() {
        assert_eq!(DisconnectReason::HostLeft.to_string(), "host left");
        assert_eq!(
            DisconnectReason::Other("kicked".into()).to_string(),
            "kicked"
        );
    }
}

//! Unified error type for Tether.

use tether_connection::{ConnectionError, SceneError};
use tether_coordinator::CoordinatorError;
use tether_presence::PresenceError;
use tether_protocol::ProtocolError;
use tether_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `tether` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TetherError {
    /// A relay-level error (already connected, send failed).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A connection command was rejected or the machine is gone.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The session scene didn't load.
    #[error(transparent)]
    Scene(#[from] SceneError),

    /// The election or a replica update failed.
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    /// A presence lookup failed.
    #[error(transparent)]
    Presence(#[from] PresenceError),
}

//! Error types for the coordinator layer.

use tether_protocol::{PeerId, ProtocolError};

/// Errors that can occur while running the election or applying updates.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// A host-only operation was called on a replica.
    #[error("only the host coordinator can {0}")]
    NotHost(&'static str),

    /// A replica-only operation was called on the host.
    #[error("the host coordinator cannot {0}")]
    NotReplica(&'static str),

    /// An update arrived from a peer that isn't our host.
    #[error("update from {from} but the session host is {host}")]
    WrongSender { from: PeerId, host: PeerId },

    /// The update broke a protocol rule.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

//! Error types for the connection layer.

use std::time::Duration;

use crate::ConnectionState;

/// Errors a [`ConnectionHandle`](crate::ConnectionHandle) call can return.
///
/// Relay failures never show up here. They are absorbed by the state
/// machine and, if unrecoverable, reported as
/// [`ConnectionEvent::RestoreFailed`](crate::ConnectionEvent::RestoreFailed).
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// The command doesn't make sense in the current state, e.g. `init`
    /// while a migration is running.
    #[error("cannot {op} while {state}")]
    InvalidState {
        op: &'static str,
        state: ConnectionState,
    },

    /// The connection actor has stopped.
    #[error("connection actor is unavailable")]
    Unavailable,

    /// A wait for a particular state gave up.
    #[error("timed out after {0:?} waiting for connection state")]
    Timeout(Duration),
}

/// Errors from waiting on scene readiness.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// The scene didn't report loaded before the deadline.
    #[error("scene {scene} not loaded after {waited:?}")]
    Timeout { scene: String, waited: Duration },
}

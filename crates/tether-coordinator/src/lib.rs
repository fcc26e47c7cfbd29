//! Session coordination for Tether: who takes over when the host goes.
//!
//! The host owns one [`SessionCoordinator`] per session. It runs the
//! fallback-host election and hands out the session's channel name; every
//! other peer runs a replica that applies the host's updates.
//!
//! # Election
//!
//! Lowest [`PeerId`](tether_protocol::PeerId) among connected non-host
//! peers wins:
//!
//! 1. A joining peer lower than the current fallback (or the first one)
//!    becomes fallback and is broadcast to everyone. Otherwise only the
//!    newcomer is told who the fallback is.
//! 2. When the fallback leaves, the host rescans the connected peers and
//!    broadcasts the new minimum (or none). Other departures change
//!    nothing.
//! 3. A replica told that it is the fallback flags itself, so its
//!    connection machine migrates as host if the host disappears.
//!
//! The coordinator is pure: it returns `(Recipient, Envelope)` pairs and
//! the caller sends them.

mod coordinator;
mod election;
mod error;
mod metadata;

pub use coordinator::{Applied, Outbound, SessionCoordinator};
pub use election::lowest_candidate;
pub use error::CoordinatorError;
pub use metadata::{SessionMetadata, channel_name_for};

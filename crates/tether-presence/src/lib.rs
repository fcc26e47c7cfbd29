//! Presence and discoverability for Tether.
//!
//! Matchmaking and deep-link joins name *destinations* (`"arena_eu"`), not
//! rooms. This crate resolves a destination to its display name and relay
//! region, finds the destination for a region, and builds the
//! [`PresenceDescriptor`] the platform advertises for the local peer.
//!
//! Nothing here influences host election or migration.

#![allow(async_fn_in_trait)]

mod directory;
mod error;
mod tracker;

pub use directory::{Destination, DestinationDirectory, StaticDirectory};
pub use error::PresenceError;
pub use tracker::{PresenceDescriptor, PresenceTracker};

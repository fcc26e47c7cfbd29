//! Shared protocol types for Tether.
//!
//! This crate defines the "language" peers speak on top of the relay:
//!
//! - **Identity** ([`PeerId`]): the relay-assigned, totally ordered id
//!   that the fallback-host election uses as its only tie-break.
//! - **Addressing** ([`Recipient`]): who an outgoing RPC is meant for.
//! - **Coordinator RPCs** ([`Envelope`], [`CoordinatorMessage`]): the
//!   messages the host's session coordinator sends to replicas.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how envelopes are turned
//!   into the opaque bytes the relay carries.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer doesn't know about connections, rooms or roles. It
//! only knows how to name peers and how to serialize coordinator messages.
//!
//! ```text
//! Relay (bytes) → Protocol (Envelope) → Coordinator (fallback host, channel)
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod error;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{CoordinatorMessage, Envelope, PeerId, Recipient};

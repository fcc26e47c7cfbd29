//! # Tether
//!
//! Self-healing peer sessions over a relay.
//!
//! One peer hosts a room, the rest join it as clients. Tether keeps the
//! session alive when the host disappears: the host continuously elects a
//! fallback host (the lowest connected client id) and tells everyone, so
//! when the relay reports the host gone the fallback re-hosts the same
//! room and the others rejoin it.
//!
//! The pieces:
//!
//! - [`tether_connection`]: the per-peer connection state machine.
//! - [`tether_coordinator`]: the fallback election and session metadata.
//! - [`tether_presence`]: destination lookups and join presence.
//! - this crate: [`SessionWiring`], which connects the two and calls your
//!   [`SessionHooks`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tether::prelude::*;
//!
//! # async fn run() -> Result<(), TetherError> {
//! let hub = RelayHub::new();
//! let (relay, relay_events) = hub.endpoint();
//! let relay = Arc::new(relay);
//!
//! let conn = ConnectionStateMachine::new(Arc::clone(&relay), relay_events).spawn();
//! let _wiring = SessionWiring::new(&conn, relay, Arc::new(NoopHooks)).spawn();
//!
//! conn.init("R1", "eu").await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod wiring;

pub use config::WiringConfig;
pub use error::TetherError;
pub use hooks::{NoopHooks, SessionHooks};
pub use wiring::{SessionWiring, WiringHandle};

pub use tether_connection;
pub use tether_coordinator;
pub use tether_presence;
pub use tether_protocol;
pub use tether_transport;

/// Everything a typical application needs.
pub mod prelude {
    pub use crate::{NoopHooks, SessionHooks, SessionWiring, TetherError, WiringConfig};
    pub use tether_connection::{
        ConnectionConfig, ConnectionEvent, ConnectionHandle, ConnectionPolicy,
        ConnectionState, ConnectionStateMachine, ConnectionStatus, SceneLoader,
    };
    pub use tether_protocol::PeerId;
    pub use tether_transport::{Relay, RelayHub, RoomSpec};
}

/// Installs a `tracing` subscriber that prints to stderr, filtered by
/// `RUST_LOG` (default `info`).
///
/// Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .try_init();
}

//! Connection lifecycle for one local peer.
//!
//! This crate turns the relay's raw events into a deterministic
//! connection state machine that heals itself when the host disappears:
//!
//! 1. **State**: [`ConnectionState`], one active state per local peer
//! 2. **Transition table**: [`transition::next_step`], a pure
//!    `state × trigger → step` function
//! 3. **Actor**: [`ConnectionStateMachine`] spawns one Tokio task that
//!    owns the state; [`ConnectionHandle`] talks to it
//! 4. **Readiness**: [`SceneSynchronizer`] makes sure the session scene
//!    is loaded before a host/client start goes out
//!
//! # How it fits in the stack
//!
//! ```text
//! Event wiring (above)      ← reacts to HostStarted / PeerJoined / RestoreFailed
//!     ↕
//! Connection (this crate)   ← lobby / host / client / migrate / restore
//!     ↕
//! Relay (below)             ← start_host, start_client, shutdown, events
//! ```
//!
//! Only [`ConnectionEvent::RestoreFailed`] reports a failure outward;
//! everything short of that is retried inside the machine.

mod config;
mod error;
mod events;
mod fallback;
mod machine;
mod policy;
mod scene;
mod state;
pub mod transition;

pub use config::ConnectionConfig;
pub use error::{ConnectionError, SceneError};
pub use events::{ConnectionEvent, SessionInfo, Subscription};
pub use fallback::FallbackSlot;
pub use machine::{ConnectionHandle, ConnectionStateMachine};
pub use policy::{ConnectionPolicy, DefaultPolicy, StaticPolicy};
pub use scene::{SceneConfig, SceneLoader, SceneSynchronizer};
pub use state::{ConnectionState, ConnectionStatus, Role};

//! Application reactions to session events.

use std::future::Future;

use tether_connection::ConnectionStatus;
use tether_protocol::PeerId;

/// What the application does when the session changes shape.
///
/// Every method has a no-op default. All calls come from the wiring task,
/// one at a time.
pub trait SessionHooks: Send + Sync + 'static {
    /// Resolves once the local player entity exists. The host waits for
    /// this before it creates its coordinator.
    fn local_ready(&self) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// The host should spawn the networked entity for `peer` (its own id
    /// included).
    fn spawn_player(&self, _peer: PeerId) {}

    /// Join the session's voice channel.
    fn start_voice(&self, _channel: &str) {}

    /// The fallback host changed. `is_local` is true when it is us.
    fn on_fallback_changed(&self, _fallback: Option<PeerId>, _is_local: bool) {}

    /// The session is unrecoverable: show the pre-session menu with
    /// `status`.
    fn return_to_menu(&self, _status: ConnectionStatus) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl SessionHooks for NoopHooks {}

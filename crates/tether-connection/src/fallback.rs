//! The local peer's view of who takes over if the host disappears.

use std::sync::Arc;

use tether_protocol::PeerId;
use tokio::sync::watch;

/// A single-writer, many-reader cell holding the current fallback host.
///
/// The replica coordinator publishes into it when an election update
/// arrives; the connection machine reads it when the host is lost to
/// decide between `MigratingHost` and `MigratingClient`. Lives as long as
/// the machine that owns it, so nothing leaks between sessions: the
/// machine clears it whenever a room connection ends.
#[derive(Debug, Clone)]
pub struct FallbackSlot {
    inner: Arc<watch::Sender<Option<PeerId>>>,
}

impl FallbackSlot {
    /// An empty slot.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { inner: Arc::new(tx) }
    }

    /// Records `fallback` as the current fallback host.
    pub fn publish(&self, fallback: Option<PeerId>) {
        self.inner.send_replace(fallback);
    }

    /// Forgets the fallback host.
    pub fn clear(&self) {
        self.publish(None);
    }

    /// The current fallback host, if any.
    pub fn current(&self) -> Option<PeerId> {
        *self.inner.borrow()
    }

    /// Whether `peer` is the current fallback host.
    pub fn is(&self, peer: PeerId) -> bool {
        self.current() == Some(peer)
    }

    /// A receiver that wakes on every change.
    pub fn subscribe(&self) -> watch::Receiver<Option<PeerId>> {
        self.inner.subscribe()
    }
}

impl Default for FallbackSlot {
    fn default() -> Self {
        Self::new()
    }
}

//! Notifications the connection machine publishes.

use tether_protocol::PeerId;
use tether_transport::{DisconnectReason, RoomSpec};
use tokio::sync::broadcast;

use crate::{ConnectionState, ConnectionStatus, Role};

/// The room connection a Started/Restored event refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Our relay-assigned id on this connection.
    pub local_id: PeerId,
    pub room: RoomSpec,
    pub role: Role,
}

/// Everything a subscriber can observe.
///
/// Started/Restored/`RestoreFailed` correspond to the callbacks an
/// application registers for. `PeerJoined`, `PeerLeft` and `Message` are
/// only forwarded while `Connected`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },
    HostStarted(SessionInfo),
    ClientStarted(SessionInfo),
    LobbyStarted {
        local_id: PeerId,
        region: String,
    },
    HostRestored(SessionInfo),
    ClientRestored(SessionInfo),
    /// Terminal: the machine gave up and is back in `Disconnected`.
    RestoreFailed(ConnectionStatus),
    PeerJoined(PeerId),
    PeerLeft(PeerId, DisconnectReason),
    Message {
        from: PeerId,
        data: Vec<u8>,
    },
}

impl ConnectionEvent {
    /// The session info of a Started/Restored event.
    pub fn session(&self) -> Option<&SessionInfo> {
        match self {
            Self::HostStarted(info)
            | Self::ClientStarted(info)
            | Self::HostRestored(info)
            | Self::ClientRestored(info) => Some(info),
            _ => None,
        }
    }
}

/// A live subscription to [`ConnectionEvent`]s.
///
/// Dropping it unsubscribes. A subscriber that falls more than
/// `event_buffer` events behind loses the oldest ones; the count is kept
/// until [`take_missed`](Self::take_missed) so consumers that mirror the
/// session can resynchronise from
/// [`ConnectionHandle::session`](crate::ConnectionHandle::session)
/// instead of trusting a gapped history.
pub struct Subscription {
    rx: broadcast::Receiver<ConnectionEvent>,
    missed: u64,
}

impl Subscription {
    pub(crate) fn new(rx: broadcast::Receiver<ConnectionEvent>) -> Self {
        Self { rx, missed: 0 }
    }

    /// The next event, or `None` once the machine has stopped.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// The next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<ConnectionEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => self.lagged(skipped),
                Err(_) => return None,
            }
        }
    }

    /// How many events were skipped since the last call, resetting the
    /// count.
    pub fn take_missed(&mut self) -> u64 {
        std::mem::take(&mut self.missed)
    }

    fn lagged(&mut self, skipped: u64) {
        tracing::warn!(skipped, "connection event subscriber lagged");
        self.missed += skipped;
    }
}

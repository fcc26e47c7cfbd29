//! Connection states, roles, and the status codes a terminal failure
//! carries back to the application.

use std::fmt;

use serde::{Deserialize, Serialize};
use tether_transport::DisconnectReason;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// The local peer's connection lifecycle.
///
/// ```text
///                 ┌──────────── init ─────────────┐
///                 ▼                               │
/// Disconnected → StartingHost ─(name taken)→ StartingClient
///      ▲              │                           │
///      │              └────────→ Connected ←──────┘
///  Disconnecting ← leave ──────────┤  │
///                                  │  └─(host lost)→ Migrating* → Restoring* ─┐
///                                  │                                          │
///                                  └─────────────── Connected ←───────────────┘
/// ```
///
/// Lobby and room switches go through `SwitchingLobby` / `SwitchingRoom`,
/// which wait for the old connection to close before starting the new one.
/// The full edge list lives in [`crate::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Disconnecting,
    StartingLobby,
    StartingHost,
    StartingClient,
    MigratingHost,
    MigratingClient,
    RestoringHost,
    RestoringClient,
    SwitchingRoom,
    SwitchingLobby,
    Connected,
    ConnectedToLobby,
}

impl ConnectionState {
    /// States that issue a relay start request on entry.
    pub fn is_starting(&self) -> bool {
        matches!(
            self,
            Self::StartingLobby
                | Self::StartingHost
                | Self::StartingClient
                | Self::RestoringHost
                | Self::RestoringClient
        )
    }

    /// States that shut the relay down on entry and move on once the
    /// resulting disconnect arrives.
    pub fn awaits_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Disconnecting
                | Self::MigratingHost
                | Self::MigratingClient
                | Self::SwitchingRoom
                | Self::SwitchingLobby
        )
    }

    /// `RestoringHost` or `RestoringClient`.
    pub fn is_restoring(&self) -> bool {
        matches!(self, Self::RestoringHost | Self::RestoringClient)
    }

    /// `Connected` or `ConnectedToLobby`: nothing in flight.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Connected | Self::ConnectedToLobby)
    }

    /// The role a host/client start state connects in. `None` for states
    /// that don't start a room connection.
    pub fn start_role(&self) -> Option<Role> {
        match self {
            Self::StartingHost | Self::RestoringHost | Self::MigratingHost => {
                Some(Role::Host)
            }
            Self::StartingClient | Self::RestoringClient | Self::MigratingClient => {
                Some(Role::Client)
            }
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Debug output is already the bare variant name.
        fmt::Debug::fmt(self, f)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which side of a room connection the local peer holds or is aiming for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Host,
    Client,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Client => write!(f, "client"),
        }
    }
}

// ---------------------------------------------------------------------------
// ConnectionStatus
// ---------------------------------------------------------------------------

/// Why a session could not be kept alive.
///
/// Carried by [`ConnectionEvent::RestoreFailed`](crate::ConnectionEvent::RestoreFailed)
/// and handed to the application when it drops the user back to the
/// pre-session menu. `code()` follows HTTP-style conventions so the number
/// alone is meaningful in logs and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// The relay stopped hearing from us (or we from it).
    Timeout,
    /// The room we tried to join doesn't exist any more.
    RoomNotFound,
    /// The room name kept colliding with another host.
    RoomNameConflict,
    /// No free slot in the room.
    RoomFull,
    /// The host disappeared and nobody could take over.
    HostLost,
    /// The session scene never finished loading.
    SceneNotLoaded,
    /// The relay refused us for a reason it didn't classify.
    Refused,
}

impl ConnectionStatus {
    /// Numeric status code.
    pub fn code(&self) -> u16 {
        match self {
            Self::RoomNotFound => 404,
            Self::Timeout => 408,
            Self::RoomNameConflict => 409,
            Self::HostLost => 410,
            Self::Refused => 500,
            Self::RoomFull => 503,
            Self::SceneNotLoaded => 504,
        }
    }
}

impl From<&DisconnectReason> for ConnectionStatus {
    fn from(reason: &DisconnectReason) -> Self {
        match reason {
            DisconnectReason::Timeout => Self::Timeout,
            DisconnectReason::RoomNotFound => Self::RoomNotFound,
            DisconnectReason::RoomNameConflict => Self::RoomNameConflict,
            DisconnectReason::RoomFull => Self::RoomFull,
            DisconnectReason::HostLeft => Self::HostLost,
            DisconnectReason::LocalShutdown | DisconnectReason::Other(_) => Self::Refused,
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.code())
    }
}

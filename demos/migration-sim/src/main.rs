//! Three peers share a room on the in-process relay. The host leaves and
//! the session carries on under the fallback host.
//!
//! Run with `RUST_LOG=debug` to see every state transition.

use std::sync::Arc;
use std::time::Duration;

use tether::prelude::*;
use tether::tether_connection::Subscription;
use tether::tether_presence::{PresenceTracker, StaticDirectory};

const DESTINATIONS: &str = r#"[
    {"api_name": "arena_eu", "display_name": "Arena (Europe)", "region": "eu"},
    {"api_name": "arena_us", "display_name": "Arena (US)", "region": "us"}
]"#;

const SETTLE: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Logs what a game client would do in response.
struct Narrator {
    name: &'static str,
}

impl SessionHooks for Narrator {
    fn spawn_player(&self, peer: PeerId) {
        tracing::info!(peer = self.name, player = %peer, "spawning player");
    }

    fn start_voice(&self, channel: &str) {
        tracing::info!(peer = self.name, %channel, "joining voice");
    }

    fn on_fallback_changed(&self, fallback: Option<PeerId>, is_local: bool) {
        tracing::info!(peer = self.name, ?fallback, is_local, "fallback host changed");
    }

    fn return_to_menu(&self, status: ConnectionStatus) {
        tracing::warn!(peer = self.name, %status, "back to menu");
    }
}

struct SimPeer {
    conn: ConnectionHandle,
    _wiring: tether::WiringHandle,
}

fn spawn_peer(hub: &RelayHub, name: &'static str) -> SimPeer {
    let (relay, events) = hub.endpoint();
    let relay = Arc::new(relay);
    let conn = ConnectionStateMachine::new(Arc::clone(&relay), events).spawn();
    let wiring = SessionWiring::new(&conn, relay, Arc::new(Narrator { name })).spawn();
    SimPeer {
        conn,
        _wiring: wiring,
    }
}

/// The first restore outcome on `events`.
async fn restored(events: &mut Subscription) -> Option<ConnectionEvent> {
    while let Some(event) = events.recv().await {
        if matches!(
            event,
            ConnectionEvent::HostRestored(_)
                | ConnectionEvent::ClientRestored(_)
                | ConnectionEvent::RestoreFailed(_)
        ) {
            return Some(event);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), TetherError> {
    tether::init_tracing();

    let presence = PresenceTracker::new(&StaticDirectory::from_json(DESTINATIONS)?);
    let destination = presence.destination_for_region("eu").unwrap_or("arena_eu");
    let descriptor = presence.describe(destination, true)?;
    tracing::info!(
        destination = %descriptor.destination,
        lobby = %descriptor.lobby_session_id,
        "advertising session"
    );

    let hub = RelayHub::new();
    let room = RoomSpec::new(descriptor.match_session_id.clone(), "eu");

    let alice = spawn_peer(&hub, "alice");
    alice.conn.init(room.name.clone(), "eu").await?;
    alice.conn.wait_for(ConnectionState::Connected, SETTLE).await?;

    let bob = spawn_peer(&hub, "bob");
    let carol = spawn_peer(&hub, "carol");
    for peer in [&bob, &carol] {
        // The room is taken, so init falls through to a client join.
        peer.conn.init(room.name.clone(), "eu").await?;
        peer.conn.wait_for(ConnectionState::Connected, SETTLE).await?;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;
    tracing::info!(members = ?hub.members(&room), fallback = ?bob.conn.fallback().current(), "session up");

    let mut bob_events = bob.conn.subscribe();
    let mut carol_events = carol.conn.subscribe();
    tracing::info!("host leaving");
    alice.conn.leave().await?;

    for events in [&mut bob_events, &mut carol_events] {
        match tokio::time::timeout(SETTLE, restored(events)).await {
            Ok(Some(event)) => tracing::info!(?event, "peer recovered"),
            _ => tracing::warn!("peer did not recover"),
        }
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
    tracing::info!(
        host = ?hub.host_of(&room),
        members = ?hub.members(&room),
        fallback = ?carol.conn.fallback().current(),
        "session migrated"
    );

    for peer in [&bob, &carol] {
        peer.conn.leave().await?;
    }
    Ok(())
}

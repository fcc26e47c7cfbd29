//! Integration tests: connection machines on the in-process relay.
//!
//! Time is paused, so backoffs and scene polls run instantly but in order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tether_connection::{
    ConnectionConfig, ConnectionError, ConnectionEvent, ConnectionHandle, ConnectionPolicy,
    ConnectionState, ConnectionStateMachine, ConnectionStatus, DefaultPolicy, Role, SceneConfig,
    SceneLoader, StaticPolicy, Subscription,
};
use tether_protocol::{PeerId, Recipient};
use tether_transport::{Relay, RelayEvent, RelayHub, RoomSpec, TransportError};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(30);

fn room() -> RoomSpec {
    RoomSpec::new("R1", "eu")
}

fn spawn_with(
    hub: &RelayHub,
    policy: Arc<dyn ConnectionPolicy>,
    config: ConnectionConfig,
) -> ConnectionHandle {
    let (relay, events) = hub.endpoint();
    ConnectionStateMachine::new(Arc::new(relay), events)
        .with_policy(policy)
        .with_config(config)
        .spawn()
}

fn spawn(hub: &RelayHub) -> ConnectionHandle {
    spawn_with(hub, Arc::new(DefaultPolicy), ConnectionConfig::default())
}

/// Reads events until one matches, failing the test after [`WAIT`].
async fn expect(
    sub: &mut Subscription,
    what: &str,
    pred: impl Fn(&ConnectionEvent) -> bool,
) -> ConnectionEvent {
    let found = tokio::time::timeout(WAIT, async {
        while let Some(event) = sub.recv().await {
            if pred(&event) {
                return Some(event);
            }
        }
        None
    })
    .await;
    match found {
        Ok(Some(event)) => event,
        _ => panic!("never saw {what}"),
    }
}

/// Every `StateChanged` target until the machine reaches `last`.
async fn states_until(sub: &mut Subscription, last: ConnectionState) -> Vec<ConnectionState> {
    let mut seen = Vec::new();
    loop {
        let event = expect(sub, "a state change", |e| {
            matches!(e, ConnectionEvent::StateChanged { .. })
        })
        .await;
        if let ConnectionEvent::StateChanged { to, .. } = event {
            seen.push(to);
            if to == last {
                return seen;
            }
        }
    }
}

async fn connected_host(hub: &RelayHub) -> ConnectionHandle {
    let host = spawn(hub);
    host.init("R1", "eu").await.unwrap();
    host.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    host
}

async fn connected_client(hub: &RelayHub, client: ConnectionHandle) -> ConnectionHandle {
    client.switch_room("R1", false, "eu").await.unwrap();
    client
        .wait_for(ConnectionState::Connected, WAIT)
        .await
        .unwrap();
    client
}

// =========================================================================
// Starting
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_init_free_room_starts_host() {
    let hub = RelayHub::new();
    let conn = spawn(&hub);
    let mut sub = conn.subscribe();

    conn.init("R1", "eu").await.unwrap();

    let event = expect(&mut sub, "HostStarted", |e| {
        matches!(e, ConnectionEvent::HostStarted(_))
    })
    .await;
    let info = event.session().unwrap();
    assert_eq!(info.role, Role::Host);
    assert_eq!(info.room, room());
    assert_eq!(hub.host_of(&room()), Some(info.local_id));
    assert_eq!(conn.session().as_ref(), Some(info));
}

#[tokio::test(start_paused = true)]
async fn test_init_taken_room_joins_as_client_without_error() {
    let hub = RelayHub::new();
    let (other_host, _other_rx) = hub.endpoint();
    other_host.start_host(&room()).await.unwrap();
    let conn = spawn(&hub);
    let mut sub = conn.subscribe();

    conn.init("R1", "eu").await.unwrap();

    let states = states_until(&mut sub, ConnectionState::Connected).await;
    assert_eq!(
        states,
        vec![
            ConnectionState::StartingHost,
            ConnectionState::StartingClient,
            ConnectionState::Connected,
        ]
    );
    let started = expect(&mut sub, "ClientStarted", |e| {
        matches!(e, ConnectionEvent::ClientStarted(_))
    })
    .await;
    assert_eq!(started.session().unwrap().room, room());
    assert_eq!(hub.members(&room()).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_init_taken_room_single_attempt_still_joins_as_client() {
    let hub = RelayHub::new();
    let (other_host, _other_rx) = hub.endpoint();
    other_host.start_host(&room()).await.unwrap();
    let config = ConnectionConfig {
        max_start_attempts: 1,
        ..ConnectionConfig::default()
    };
    let conn = spawn_with(&hub, Arc::new(DefaultPolicy), config);
    let mut sub = conn.subscribe();

    conn.init("R1", "eu").await.unwrap();

    let states = states_until(&mut sub, ConnectionState::Connected).await;
    assert_eq!(
        states,
        vec![
            ConnectionState::StartingHost,
            ConnectionState::StartingClient,
            ConnectionState::Connected,
        ]
    );
    while let Some(event) = sub.try_recv() {
        assert!(
            !matches!(event, ConnectionEvent::RestoreFailed(_)),
            "conflict surfaced as {event:?}"
        );
    }
    assert_eq!(hub.members(&room()).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_init_while_connected_is_rejected() {
    let hub = RelayHub::new();
    let conn = connected_host(&hub).await;

    let err = conn.init("R2", "eu").await.unwrap_err();

    assert!(matches!(
        err,
        ConnectionError::InvalidState {
            state: ConnectionState::Connected,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_switch_room_missing_room_ineligible_fails_once() {
    let hub = RelayHub::new();
    let conn = spawn_with(
        &hub,
        Arc::new(StaticPolicy::ineligible()),
        ConnectionConfig::default(),
    );
    let mut sub = conn.subscribe();

    conn.switch_room("R9", false, "eu").await.unwrap();

    let failed = expect(&mut sub, "RestoreFailed", |e| {
        matches!(e, ConnectionEvent::RestoreFailed(_))
    })
    .await;
    assert_eq!(
        failed,
        ConnectionEvent::RestoreFailed(ConnectionStatus::RoomNotFound)
    );
    conn.wait_for(ConnectionState::Disconnected, WAIT)
        .await
        .unwrap();
}

// =========================================================================
// Lobby, switching, leaving
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_go_to_lobby_then_init_switches_into_room() {
    let hub = RelayHub::new();
    let conn = spawn(&hub);
    let mut sub = conn.subscribe();
    conn.set_region("eu").await.unwrap();

    conn.go_to_lobby().await.unwrap();
    let lobby = expect(&mut sub, "LobbyStarted", |e| {
        matches!(e, ConnectionEvent::LobbyStarted { .. })
    })
    .await;
    assert!(matches!(lobby, ConnectionEvent::LobbyStarted { ref region, .. } if region == "eu"));

    conn.init("R1", "eu").await.unwrap();

    let states = states_until(&mut sub, ConnectionState::Connected).await;
    assert_eq!(
        states,
        vec![
            ConnectionState::SwitchingRoom,
            ConnectionState::StartingHost,
            ConnectionState::Connected,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_switch_room_from_host_joins_other_room_as_client() {
    let hub = RelayHub::new();
    let (other_host, _other_rx) = hub.endpoint();
    other_host.start_host(&RoomSpec::new("R2", "eu")).await.unwrap();
    let conn = connected_host(&hub).await;
    let mut sub = conn.subscribe();

    conn.switch_room("R2", false, "eu").await.unwrap();

    expect(&mut sub, "ClientStarted", |e| {
        matches!(e, ConnectionEvent::ClientStarted(info) if info.room.name == "R2")
    })
    .await;
    assert_eq!(hub.host_of(&room()), None);
}

#[tokio::test(start_paused = true)]
async fn test_go_to_lobby_from_room_switches_through_lobby_states() {
    let hub = RelayHub::new();
    let conn = connected_host(&hub).await;
    let mut sub = conn.subscribe();

    conn.go_to_lobby().await.unwrap();

    let states = states_until(&mut sub, ConnectionState::ConnectedToLobby).await;
    assert_eq!(
        states,
        vec![
            ConnectionState::SwitchingLobby,
            ConnectionState::StartingLobby,
            ConnectionState::ConnectedToLobby,
        ]
    );
    let lobby = expect(&mut sub, "LobbyStarted", |e| {
        matches!(e, ConnectionEvent::LobbyStarted { .. })
    })
    .await;
    assert!(matches!(lobby, ConnectionEvent::LobbyStarted { region, .. } if region == "eu"));
    assert_eq!(hub.host_of(&room()), None);
}

#[tokio::test(start_paused = true)]
async fn test_leave_closes_room_and_disconnects() {
    let hub = RelayHub::new();
    let conn = connected_host(&hub).await;
    let mut sub = conn.subscribe();

    conn.leave().await.unwrap();

    let states = states_until(&mut sub, ConnectionState::Disconnected).await;
    assert_eq!(
        states,
        vec![ConnectionState::Disconnecting, ConnectionState::Disconnected]
    );
    assert_eq!(hub.host_of(&room()), None);
    assert!(sub.try_recv().is_none());
    assert_eq!(conn.session(), None);
}

#[tokio::test(start_paused = true)]
async fn test_leave_when_disconnected_is_noop() {
    let hub = RelayHub::new();
    let conn = spawn(&hub);

    conn.leave().await.unwrap();

    assert_eq!(conn.state(), ConnectionState::Disconnected);
}

// =========================================================================
// Room traffic
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_host_sees_peer_join_and_leave() {
    let hub = RelayHub::new();
    let host = connected_host(&hub).await;
    let mut sub = host.subscribe();
    let (client, _client_rx) = hub.endpoint();

    client.start_client(&room(), &[]).await.unwrap();
    let joined = expect(&mut sub, "PeerJoined", |e| {
        matches!(e, ConnectionEvent::PeerJoined(_))
    })
    .await;
    client.shutdown().await.unwrap();
    let left = expect(&mut sub, "PeerLeft", |e| {
        matches!(e, ConnectionEvent::PeerLeft(..))
    })
    .await;

    assert_eq!(joined, ConnectionEvent::PeerJoined(PeerId(2)));
    assert!(matches!(left, ConnectionEvent::PeerLeft(PeerId(2), _)));
}

// =========================================================================
// Recovery
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_client_timeout_restores_as_client() {
    let hub = RelayHub::new();
    let _host = connected_host(&hub).await;
    let client = connected_client(&hub, spawn(&hub)).await;
    let mut sub = client.subscribe();

    hub.time_out(PeerId(2));

    let restored = expect(&mut sub, "ClientRestored", |e| {
        matches!(e, ConnectionEvent::ClientRestored(_))
    })
    .await;
    // The relay hands out a fresh id on reconnect.
    assert_eq!(restored.session().unwrap().local_id, PeerId(3));
}

#[tokio::test(start_paused = true)]
async fn test_host_timeout_restores_as_host() {
    let hub = RelayHub::new();
    let host = connected_host(&hub).await;
    let old_id = hub.host_of(&room()).unwrap();
    let mut sub = host.subscribe();

    hub.time_out(old_id);

    let states = states_until(&mut sub, ConnectionState::Connected).await;
    assert_eq!(
        states,
        vec![ConnectionState::RestoringHost, ConnectionState::Connected]
    );
    let restored = expect(&mut sub, "HostRestored", |e| {
        matches!(e, ConnectionEvent::HostRestored(_))
    })
    .await;
    let info = restored.session().unwrap();
    assert_eq!(info.role, Role::Host);
    assert_ne!(info.local_id, old_id);
    assert_eq!(hub.host_of(&room()), Some(info.local_id));
}

#[tokio::test(start_paused = true)]
async fn test_host_loss_fallback_takes_over_and_others_follow() {
    let hub = RelayHub::new();
    let host = connected_host(&hub).await;
    let fallback = connected_client(&hub, spawn(&hub)).await;
    let other = connected_client(&hub, spawn(&hub)).await;
    fallback.fallback().publish(Some(PeerId(2)));
    other.fallback().publish(Some(PeerId(2)));
    let mut fallback_sub = fallback.subscribe();
    let mut other_sub = other.subscribe();

    host.leave().await.unwrap();

    let states = states_until(&mut fallback_sub, ConnectionState::Connected).await;
    assert_eq!(
        states,
        vec![
            ConnectionState::MigratingHost,
            ConnectionState::RestoringHost,
            ConnectionState::Connected,
        ]
    );
    let hosted = expect(&mut fallback_sub, "HostRestored", |e| {
        matches!(e, ConnectionEvent::HostRestored(_))
    })
    .await;
    expect(&mut other_sub, "ClientRestored", |e| {
        matches!(e, ConnectionEvent::ClientRestored(_))
    })
    .await;
    assert_eq!(hub.host_of(&room()), Some(hosted.session().unwrap().local_id));
    assert_eq!(hub.members(&room()).len(), 2);
    // The old election result is gone with the old room.
    assert_eq!(fallback.fallback().current(), None);
}

#[tokio::test(start_paused = true)]
async fn test_restore_bound_one_fails_after_second_failure() {
    let hub = RelayHub::new();
    let (host, _host_rx) = hub.endpoint();
    host.start_host(&room()).await.unwrap();
    let config = ConnectionConfig {
        max_restore_retries: 1,
        ..ConnectionConfig::default()
    };
    let retry_delay = config.retry_delay;
    let client = spawn_with(&hub, Arc::new(StaticPolicy::ineligible()), config);
    let client = connected_client(&hub, client).await;
    let mut sub = client.subscribe();
    let lost_at = tokio::time::Instant::now();

    host.shutdown().await.unwrap();

    let failed = expect(&mut sub, "RestoreFailed", |e| {
        matches!(e, ConnectionEvent::RestoreFailed(_))
    })
    .await;
    assert_eq!(
        failed,
        ConnectionEvent::RestoreFailed(ConnectionStatus::RoomNotFound)
    );
    // One backed-off retry happened before giving up.
    assert!(lost_at.elapsed() >= retry_delay);
    client
        .wait_for(ConnectionState::Disconnected, WAIT)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;
    let mut more_failures = 0;
    while let Some(event) = sub.try_recv() {
        if matches!(event, ConnectionEvent::RestoreFailed(_)) {
            more_failures += 1;
        }
    }
    assert_eq!(more_failures, 0);
}

#[tokio::test(start_paused = true)]
async fn test_restore_exhausted_eligible_client_escalates_to_host() {
    let hub = RelayHub::new();
    let (host, _host_rx) = hub.endpoint();
    host.start_host(&room()).await.unwrap();
    let config = ConnectionConfig {
        max_restore_retries: 1,
        ..ConnectionConfig::default()
    };
    let client = spawn_with(&hub, Arc::new(DefaultPolicy), config);
    let client = connected_client(&hub, client).await;
    let mut sub = client.subscribe();

    host.shutdown().await.unwrap();

    let restored = expect(&mut sub, "HostRestored", |e| {
        matches!(
            e,
            ConnectionEvent::HostRestored(_) | ConnectionEvent::RestoreFailed(_)
        )
    })
    .await;
    assert!(matches!(restored, ConnectionEvent::HostRestored(_)));
    assert_eq!(
        hub.host_of(&room()),
        Some(restored.session().unwrap().local_id)
    );
}

// =========================================================================
// Scene readiness and cancellation
// =========================================================================

/// Loads instantly once asked, or never.
struct FlagLoader {
    loads: bool,
    loaded: AtomicBool,
    requests: AtomicUsize,
}

impl SceneLoader for FlagLoader {
    fn load_scene(&self, _name: &str) {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.loads {
            self.loaded.store(true, Ordering::SeqCst);
        }
    }

    fn is_scene_loaded(&self, _name: &str) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }
}

fn scene_machine(hub: &RelayHub, loader: Arc<FlagLoader>) -> ConnectionHandle {
    let (relay, events) = hub.endpoint();
    let config = ConnectionConfig {
        session_scene: Some("Arena".into()),
        scene: SceneConfig {
            poll_interval: Duration::from_millis(10),
            deadline: Duration::from_secs(2),
        },
        ..ConnectionConfig::default()
    };
    ConnectionStateMachine::new(Arc::new(relay), events)
        .with_config(config)
        .with_scene_loader(loader)
        .spawn()
}

#[tokio::test(start_paused = true)]
async fn test_start_waits_for_session_scene() {
    let hub = RelayHub::new();
    let loader = Arc::new(FlagLoader {
        loads: true,
        loaded: AtomicBool::new(false),
        requests: AtomicUsize::new(0),
    });
    let conn = scene_machine(&hub, Arc::clone(&loader));

    conn.init("R1", "eu").await.unwrap();
    conn.wait_for(ConnectionState::Connected, WAIT)
        .await
        .unwrap();

    assert_eq!(loader.requests.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_leave_during_scene_wait_abandons_start() {
    let hub = RelayHub::new();
    let loader = Arc::new(FlagLoader {
        loads: false,
        loaded: AtomicBool::new(false),
        requests: AtomicUsize::new(0),
    });
    let conn = scene_machine(&hub, loader);
    let mut sub = conn.subscribe();

    conn.init("R1", "eu").await.unwrap();
    tokio::time::sleep(Duration::from_millis(500)).await;
    conn.leave().await.unwrap();
    conn.wait_for(ConnectionState::Disconnected, WAIT)
        .await
        .unwrap();
    // Well past the scene deadline the abandoned start must not resurface.
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(conn.state(), ConnectionState::Disconnected);
    assert_eq!(hub.host_of(&room()), None);
    while let Some(event) = sub.try_recv() {
        assert!(!matches!(event, ConnectionEvent::RestoreFailed(_)));
    }
}

// =========================================================================
// Relay failures outside the hub
// =========================================================================

/// Hosts anything instantly but can never shut down.
struct StuckRelay {
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl Relay for StuckRelay {
    async fn start_host(&self, _room: &RoomSpec) -> Result<(), TransportError> {
        let _ = self.events.send(RelayEvent::Connected {
            local_id: PeerId(1),
        });
        Ok(())
    }

    async fn start_client(&self, _room: &RoomSpec, _payload: &[u8]) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    async fn join_lobby(&self, _region: &str) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        Err(TransportError::SendFailed("link already gone".into()))
    }

    async fn send(&self, _to: Recipient, _data: &[u8]) -> Result<(), TransportError> {
        Ok(())
    }

    fn local_peer(&self) -> Option<PeerId> {
        None
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        Vec::new()
    }
}

#[tokio::test(start_paused = true)]
async fn test_leave_with_failing_shutdown_still_disconnects() {
    let (tx, rx) = mpsc::unbounded_channel();
    let conn = ConnectionStateMachine::new(Arc::new(StuckRelay { events: tx }), rx).spawn();
    conn.init("R1", "eu").await.unwrap();
    conn.wait_for(ConnectionState::Connected, WAIT).await.unwrap();
    let mut sub = conn.subscribe();

    conn.leave().await.unwrap();

    let states = states_until(&mut sub, ConnectionState::Disconnected).await;
    assert_eq!(
        states,
        vec![ConnectionState::Disconnecting, ConnectionState::Disconnected]
    );
    while let Some(event) = sub.try_recv() {
        assert!(!matches!(event, ConnectionEvent::RestoreFailed(_)));
    }
}

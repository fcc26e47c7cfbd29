//! Session wiring: connection events in, coordinator and hook calls out.
//!
//! One task per local peer. It owns the current [`SessionCoordinator`]
//! and processes events strictly in the order the connection machine
//! published them, so a replica always exists before the host's first
//! update reaches it.

use std::collections::HashSet;
use std::sync::Arc;

use tether_connection::{
    ConnectionEvent, ConnectionHandle, ConnectionState, FallbackSlot, Role, SessionInfo,
    Subscription,
};
use tether_coordinator::{Applied, Outbound, SessionCoordinator};
use tether_protocol::{Codec, Envelope, JsonCodec, PeerId};
use tether_transport::{DisconnectReason, Relay};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::{SessionHooks, WiringConfig};

/// Ties a connection machine to the session coordinator and the
/// application's [`SessionHooks`].
///
/// Subscribes on construction, so events published between `new` and
/// [`spawn`](Self::spawn) are queued rather than lost. If more than the
/// machine's `event_buffer` pile up, the task notices the gap and rebuilds
/// its view from the machine's current session.
///
/// On the host, the coordinator is created once `hooks.local_ready()`
/// resolves or `coordinator_wait` runs out, whichever comes first. Peers
/// that join before then are held and processed right after, so no join
/// waits longer than `coordinator_wait` for its election.
pub struct SessionWiring<R: Relay, H: SessionHooks, C: Codec = JsonCodec> {
    events: Subscription,
    session: watch::Receiver<Option<SessionInfo>>,
    fallback: FallbackSlot,
    relay: Arc<R>,
    hooks: Arc<H>,
    codec: C,
    config: WiringConfig,
}

impl<R: Relay, H: SessionHooks> SessionWiring<R, H> {
    /// Wiring for the machine behind `conn`. `relay` must be the relay
    /// that machine drives; the wiring sends coordinator RPCs through it.
    pub fn new(conn: &ConnectionHandle, relay: Arc<R>, hooks: Arc<H>) -> Self {
        Self {
            events: conn.subscribe(),
            session: conn.watch_session(),
            fallback: conn.fallback().clone(),
            relay,
            hooks,
            codec: JsonCodec,
            config: WiringConfig::default(),
        }
    }
}

impl<R: Relay, H: SessionHooks, C: Codec> SessionWiring<R, H, C> {
    pub fn with_config(mut self, config: WiringConfig) -> Self {
        self.config = config.validated();
        self
    }

    /// Replaces the codec used for coordinator RPCs. Every peer in a
    /// session must use the same one.
    pub fn with_codec<C2: Codec>(self, codec: C2) -> SessionWiring<R, H, C2> {
        SessionWiring {
            events: self.events,
            session: self.session,
            fallback: self.fallback,
            relay: self.relay,
            hooks: self.hooks,
            codec,
            config: self.config,
        }
    }

    /// Starts the wiring task.
    pub fn spawn(self) -> WiringHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();

        let task = Wiring {
            relay: self.relay,
            hooks: self.hooks,
            codec: self.codec,
            config: self.config,
            fallback: self.fallback,
            current: self.session,
            session: None,
            coordinator: None,
            players: HashSet::new(),
            waiting: Vec::new(),
            epoch: 0,
            setup: None,
            ready_tx,
        };
        let join = tokio::spawn(task.run(self.events, ready_rx, shutdown_rx));

        WiringHandle {
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

/// Owns a running wiring task. Dropping it aborts the task.
pub struct WiringHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl WiringHandle {
    /// Tears the current session down and waits for the task to stop.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(error = %e, "wiring task ended abnormally");
            }
        }
    }
}

impl Drop for WiringHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            join.abort();
        }
    }
}

// ===========================================================================
// The task
// ===========================================================================

struct Wiring<R, H, C> {
    relay: Arc<R>,
    hooks: Arc<H>,
    codec: C,
    config: WiringConfig,
    fallback: FallbackSlot,
    /// The machine's own view of the session, for resyncing after a lag.
    current: watch::Receiver<Option<SessionInfo>>,

    /// The session we're wired to, from its Started/Restored event.
    session: Option<SessionInfo>,
    coordinator: Option<SessionCoordinator>,
    /// Peers the host has spawned a player for.
    players: HashSet<PeerId>,
    /// Joins that arrived before the host coordinator existed.
    waiting: Vec<PeerId>,
    /// Bumped on every teardown. A `local_ready` answer for an older
    /// epoch belongs to a session that's gone.
    epoch: u64,
    setup: Option<JoinHandle<()>>,
    /// `(epoch, local player ready)` from the setup task.
    ready_tx: mpsc::UnboundedSender<(u64, bool)>,
}

impl<R: Relay, H: SessionHooks, C: Codec> Wiring<R, H, C> {
    async fn run(
        mut self,
        mut events: Subscription,
        mut ready_rx: mpsc::UnboundedReceiver<(u64, bool)>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        tracing::debug!("session wiring started");
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,

                event = events.recv() => match event {
                    Some(event) => {
                        let missed = events.take_missed();
                        if missed > 0 {
                            self.resync(missed);
                        }
                        self.on_event(event).await;
                    }
                    None => {
                        tracing::debug!("connection machine gone");
                        break;
                    }
                },

                Some((epoch, ready)) = ready_rx.recv() => self.on_local_ready(epoch, ready).await,
            }
        }
        self.teardown("wiring stopped");
        tracing::debug!("session wiring stopped");
    }

    async fn on_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::HostStarted(info) | ConnectionEvent::HostRestored(info) => {
                self.begin_host(info);
            }
            ConnectionEvent::ClientStarted(info) | ConnectionEvent::ClientRestored(info) => {
                self.begin_replica(info);
            }
            ConnectionEvent::PeerJoined(peer) => self.on_peer_joined(peer).await,
            ConnectionEvent::PeerLeft(peer, reason) => self.on_peer_left(peer, reason).await,
            ConnectionEvent::Message { from, data } => self.on_message(from, &data),
            ConnectionEvent::RestoreFailed(status) => {
                self.teardown("restore failed");
                tracing::warn!(%status, "session unrecoverable, returning to menu");
                self.hooks.return_to_menu(status);
            }
            ConnectionEvent::StateChanged { from, to } => {
                let leaving = from == ConnectionState::Connected
                    || matches!(
                        to,
                        ConnectionState::Disconnected
                            | ConnectionState::ConnectedToLobby
                            | ConnectionState::StartingLobby
                    );
                if leaving {
                    self.teardown("left session");
                }
            }
            ConnectionEvent::LobbyStarted { .. } => {}
        }
    }

    // -- Session lifecycle --------------------------------------------------

    fn begin_host(&mut self, info: SessionInfo) {
        self.teardown("new session");
        tracing::info!(local = %info.local_id, room = %info.room, "hosting, waiting for local player");
        self.session = Some(info);

        let hooks = Arc::clone(&self.hooks);
        let ready_tx = self.ready_tx.clone();
        let epoch = self.epoch;
        let wait = self.config.coordinator_wait;
        self.setup = Some(tokio::spawn(async move {
            let ready = tokio::time::timeout(wait, hooks.local_ready()).await.is_ok();
            let _ = ready_tx.send((epoch, ready));
        }));
    }

    async fn on_local_ready(&mut self, epoch: u64, ready: bool) {
        if epoch != self.epoch {
            tracing::debug!(epoch, current = self.epoch, "stale local-ready ignored");
            return;
        }
        self.setup = None;
        let Some(info) = self.session.as_ref().filter(|s| s.role == Role::Host) else {
            return;
        };
        if !ready {
            tracing::warn!(
                wait = ?self.config.coordinator_wait,
                held = self.waiting.len(),
                "local player not ready in time, starting election anyway"
            );
        }

        let coordinator = SessionCoordinator::host(
            info.local_id,
            &info.room,
            &self.config.lobby_id,
            self.fallback.clone(),
        );
        self.hooks.spawn_player(info.local_id);
        if let Some(channel) = coordinator.channel_name() {
            self.hooks.start_voice(channel);
        }
        self.coordinator = Some(coordinator);

        // Everyone already in the room, then the joins we held back.
        let mut pending = self.relay.connected_peers();
        pending.append(&mut self.waiting);
        for peer in pending {
            self.join_peer(peer).await;
        }
    }

    fn begin_replica(&mut self, info: SessionInfo) {
        self.teardown("new session");
        tracing::info!(local = %info.local_id, room = %info.room, "joined as client");
        self.coordinator = Some(SessionCoordinator::replica(
            info.local_id,
            &info.room,
            self.fallback.clone(),
        ));
        self.session = Some(info);
    }

    /// Rebuilds the wiring from the machine's current session after the
    /// event stream dropped `missed` events.
    fn resync(&mut self, missed: u64) {
        tracing::warn!(missed, "connection events lost, resynchronising session");
        self.teardown("event stream lagged");
        let current = self.current.borrow().clone();
        match current {
            Some(info) if info.role == Role::Host => self.begin_host(info),
            Some(info) => self.begin_replica(info),
            None => {}
        }
    }

    fn teardown(&mut self, reason: &'static str) {
        if let Some(setup) = self.setup.take() {
            setup.abort();
        }
        if self.session.take().is_some() {
            tracing::debug!(reason, "session wiring torn down");
        }
        self.coordinator = None;
        self.players.clear();
        self.waiting.clear();
        self.epoch += 1;
        self.fallback.clear();
    }

    // -- Host side ----------------------------------------------------------

    async fn on_peer_joined(&mut self, peer: PeerId) {
        let Some(session) = &self.session else {
            tracing::debug!(%peer, "join outside a session ignored");
            return;
        };
        if session.role != Role::Host {
            return;
        }
        if self.coordinator.is_some() {
            self.join_peer(peer).await;
        } else if !self.waiting.contains(&peer) {
            tracing::debug!(%peer, "coordinator not ready, holding join");
            self.waiting.push(peer);
        }
    }

    async fn join_peer(&mut self, peer: PeerId) {
        let Some(coordinator) = self.coordinator.as_mut() else {
            return;
        };
        if !self.players.insert(peer) {
            tracing::debug!(%peer, "repeated join ignored");
            return;
        }
        match coordinator.on_peer_joined(peer) {
            Ok(out) => {
                self.hooks.spawn_player(peer);
                self.send(out).await;
            }
            Err(e) => tracing::warn!(%peer, error = %e, "join not processed"),
        }
    }

    async fn on_peer_left(&mut self, peer: PeerId, reason: DisconnectReason) {
        self.waiting.retain(|p| *p != peer);
        self.players.remove(&peer);

        let Some(coordinator) = self.coordinator.as_mut().filter(|c| c.is_host()) else {
            return;
        };
        tracing::debug!(%peer, %reason, "peer left");
        match coordinator.on_peer_left(peer, self.relay.connected_peers()) {
            Ok(out) => self.send(out).await,
            Err(e) => tracing::warn!(%peer, error = %e, "departure not processed"),
        }
    }

    async fn send(&self, out: Vec<Outbound>) {
        for (to, envelope) in out {
            let bytes = match self.codec.encode(&envelope) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to encode coordinator update");
                    continue;
                }
            };
            if let Err(e) = self.relay.send(to, &bytes).await {
                tracing::warn!(?to, error = %e, "failed to send coordinator update");
            }
        }
    }

    // -- Replica side -------------------------------------------------------

    fn on_message(&mut self, from: PeerId, data: &[u8]) {
        let Some(coordinator) = self.coordinator.as_mut() else {
            tracing::debug!(%from, "message outside a session dropped");
            return;
        };
        if coordinator.is_host() {
            tracing::debug!(%from, "host ignores peer messages");
            return;
        }
        let envelope: Envelope = match self.codec.decode(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(%from, error = %e, "undecodable message dropped");
                return;
            }
        };
        match coordinator.apply(from, envelope) {
            Ok(Applied::Fallback(fallback)) => {
                let is_local = fallback == Some(coordinator.local());
                self.hooks.on_fallback_changed(fallback, is_local);
            }
            Ok(Applied::ChannelName(channel)) => self.hooks.start_voice(&channel),
            Ok(Applied::Stale | Applied::Unchanged) => {}
            Err(e) => tracing::warn!(%from, error = %e, "update rejected"),
        }
    }
}

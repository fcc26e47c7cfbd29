//! The connection actor: one Tokio task per local peer that owns the
//! [`ConnectionState`] and drives the relay.
//!
//! The outside world talks to it through a [`ConnectionHandle`]; the relay
//! talks to it through its event channel. Both are drained by a single
//! `tokio::select!` loop, so state only ever changes on the actor's task.
//!
//! Every input becomes a [`Trigger`] and goes through the pure transition
//! table in [`transition`]. The actor only applies the resulting [`Step`]:
//! entering a state, bumping an attempt counter, or giving up. The next
//! start request is issued as a side effect of entering the state.
//!
//! # Outputs
//!
//! - [`ConnectionHandle::state`] / [`watch_state`](ConnectionHandle::watch_state):
//!   the current state, always up to date.
//! - [`ConnectionHandle::session`]: the room connection held while
//!   `Connected`.
//! - [`ConnectionHandle::subscribe`]: every [`ConnectionEvent`], in order,
//!   on a bounded broadcast channel.
//!
//! # Suspensions
//!
//! Before a start goes out the actor may have to wait: a retry backoff,
//! then the session scene. That wait runs in a spawned task which reports
//! back with the machine's **generation** at the time it was scheduled.
//! Every state change bumps the generation and aborts the pending task,
//! so at most one start is ever in flight and a late report is dropped.

use std::sync::Arc;
use std::time::Duration;

use tether_protocol::PeerId;
use tether_transport::{DisconnectReason, Relay, RelayEvent, RoomSpec};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::transition::{self, Facts, Step, Trigger};
use crate::{
    ConnectionConfig, ConnectionError, ConnectionEvent, ConnectionPolicy, ConnectionState,
    ConnectionStatus, DefaultPolicy, FallbackSlot, Role, SceneError, SceneLoader,
    SceneSynchronizer, SessionInfo, Subscription,
};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

type Reply = oneshot::Sender<Result<(), ConnectionError>>;

/// Requests from a [`ConnectionHandle`].
enum Command {
    Init {
        room: String,
        region: String,
        reply: Reply,
    },
    SwitchRoom {
        room: String,
        is_host: bool,
        region: String,
        reply: Reply,
    },
    GoToLobby {
        reply: Reply,
    },
    Leave {
        reply: Reply,
    },
    SetRegion {
        region: String,
    },
}

/// Reports from the actor's own background work.
enum Wake {
    /// The pre-start wait scheduled at `generation` finished.
    StartReady {
        generation: u64,
        outcome: Result<(), SceneError>,
    },
    /// `shutdown()` failed, so no echo will arrive. Treated as if it had.
    ShutdownLost { generation: u64 },
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builds and spawns a connection actor.
///
/// ```ignore
/// let hub = RelayHub::new();
/// let (relay, events) = hub.endpoint();
/// let conn = ConnectionStateMachine::new(Arc::new(relay), events)
///     .with_policy(Arc::new(DefaultPolicy))
///     .spawn();
/// conn.init("R1", "eu").await?;
/// ```
pub struct ConnectionStateMachine<R: Relay> {
    relay: Arc<R>,
    relay_events: mpsc::UnboundedReceiver<RelayEvent>,
    policy: Arc<dyn ConnectionPolicy>,
    scene_loader: Option<Arc<dyn SceneLoader>>,
    config: ConnectionConfig,
    fallback: FallbackSlot,
}

impl<R: Relay> ConnectionStateMachine<R> {
    /// A machine driving `relay`, reading `relay_events`.
    pub fn new(relay: Arc<R>, relay_events: mpsc::UnboundedReceiver<RelayEvent>) -> Self {
        Self {
            relay,
            relay_events,
            policy: Arc::new(DefaultPolicy),
            scene_loader: None,
            config: ConnectionConfig::default(),
            fallback: FallbackSlot::new(),
        }
    }

    /// Supplies the client connect payload and decides whether this peer
    /// may take over as host. Defaults to [`DefaultPolicy`]: no payload,
    /// always eligible.
    pub fn with_policy(mut self, policy: Arc<dyn ConnectionPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Scene loader used for the readiness wait when
    /// [`ConnectionConfig::session_scene`] is set.
    pub fn with_scene_loader(mut self, loader: Arc<dyn SceneLoader>) -> Self {
        self.scene_loader = Some(loader);
        self
    }

    /// Retry limits, backoff and buffer sizes. Out-of-range values are
    /// clamped when the actor is spawned.
    pub fn with_config(mut self, config: ConnectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing fallback slot instead of creating one.
    ///
    /// Whoever runs the election publishes into this slot. The machine
    /// only reads it when the host goes away.
    pub fn with_fallback_slot(mut self, slot: FallbackSlot) -> Self {
        self.fallback = slot;
        self
    }

    /// Spawns the actor on the current Tokio runtime.
    ///
    /// The actor starts `Disconnected` and runs until every handle is
    /// dropped.
    pub fn spawn(self) -> ConnectionHandle {
        let config = self.config.validated();
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let (wake_tx, wake_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (session_tx, session_rx) = watch::channel(None);
        let (events, _) = broadcast::channel(config.event_buffer);
        let scenes = self
            .scene_loader
            .map(|loader| SceneSynchronizer::new(loader, config.scene.clone()));

        let actor = Actor {
            relay: self.relay,
            policy: self.policy,
            scenes,
            config,
            fallback: self.fallback.clone(),
            events: events.clone(),
            state_tx,
            session_tx,
            wake_tx,
            state: ConnectionState::Disconnected,
            generation: 0,
            pending: None,
            start_pending: false,
            room: None,
            region: String::new(),
            role: None,
            switch_target: Role::Host,
            local_id: None,
            restore_retries: 0,
            escalated: false,
            start_attempts: 0,
        };

        tokio::spawn(actor.run(cmd_rx, self.relay_events, wake_rx));

        ConnectionHandle {
            commands: cmd_tx,
            state: state_rx,
            session: session_rx,
            events,
            fallback: self.fallback,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to a running connection actor. Cheap to clone.
///
/// Commands return once the actor has *accepted* them; outcomes arrive as
/// [`ConnectionEvent`]s or can be awaited with [`wait_for`](Self::wait_for).
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<ConnectionState>,
    session: watch::Receiver<Option<SessionInfo>>,
    events: broadcast::Sender<ConnectionEvent>,
    fallback: FallbackSlot,
}

impl ConnectionHandle {
    /// Hosts `room` in `region`, falling back to joining it if another
    /// host already owns the name.
    ///
    /// # Errors
    /// [`ConnectionError::InvalidState`] unless disconnected or in the lobby.
    pub async fn init(
        &self,
        room: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<(), ConnectionError> {
        let (room, region) = (room.into(), region.into());
        self.request(|reply| Command::Init {
            room,
            region,
            reply,
        })
        .await
    }

    /// Leaves the current room (or lobby) and connects to `room` as host
    /// or client.
    ///
    /// The old connection is shut down first and its disconnect is not
    /// treated as a failure. A host start that finds the name taken turns
    /// into a client join, as with [`init`](Self::init).
    ///
    /// # Errors
    /// [`ConnectionError::InvalidState`] unless disconnected, connected or
    /// in the lobby.
    pub async fn switch_room(
        &self,
        room: impl Into<String>,
        is_host: bool,
        region: impl Into<String>,
    ) -> Result<(), ConnectionError> {
        let (room, region) = (room.into(), region.into());
        self.request(|reply| Command::SwitchRoom {
            room,
            is_host,
            region,
            reply,
        })
        .await
    }

    /// Connects to the current region's lobby, leaving any room first.
    ///
    /// Emits [`ConnectionEvent::LobbyStarted`] once the lobby connection
    /// is up. Room-only state (session, fallback) is cleared on the way.
    pub async fn go_to_lobby(&self) -> Result<(), ConnectionError> {
        self.request(|reply| Command::GoToLobby { reply }).await
    }

    /// Shuts the connection down cleanly. No recovery follows.
    ///
    /// The machine ends `Disconnected` even if the relay fails to confirm
    /// the shutdown.
    pub async fn leave(&self) -> Result<(), ConnectionError> {
        self.request(|reply| Command::Leave { reply }).await
    }

    /// Sets the region used by the next lobby connection.
    pub async fn set_region(&self, region: impl Into<String>) -> Result<(), ConnectionError> {
        self.commands
            .send(Command::SetRegion {
                region: region.into(),
            })
            .await
            .map_err(|_| ConnectionError::Unavailable)
    }

    /// The current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// The room connection currently held, if the machine is `Connected`.
    ///
    /// Matches the most recent Started/Restored event. A subscriber that
    /// lagged past that event reads the session from here.
    pub fn session(&self) -> Option<SessionInfo> {
        self.session.borrow().clone()
    }

    /// A receiver that wakes whenever the held session changes.
    pub fn watch_session(&self) -> watch::Receiver<Option<SessionInfo>> {
        self.session.clone()
    }

    /// A receiver that wakes on every state change.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Subscribes to connection events from now on.
    ///
    /// The channel holds `event_buffer` events per subscriber. A slow
    /// subscriber loses the oldest ones and can read how many with
    /// [`Subscription::take_missed`].
    pub fn subscribe(&self) -> Subscription {
        Subscription::new(self.events.subscribe())
    }

    /// The slot the machine reads when deciding how to migrate.
    pub fn fallback(&self) -> &FallbackSlot {
        &self.fallback
    }

    /// Waits until the machine is in `target`.
    ///
    /// # Errors
    /// [`ConnectionError::Timeout`] after `timeout`,
    /// [`ConnectionError::Unavailable`] if the actor stopped.
    pub async fn wait_for(
        &self,
        target: ConnectionState,
        timeout: Duration,
    ) -> Result<(), ConnectionError> {
        let mut rx = self.state.clone();
        match tokio::time::timeout(timeout, rx.wait_for(|s| *s == target)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(ConnectionError::Unavailable),
            Err(_) => Err(ConnectionError::Timeout(timeout)),
        }
    }

    async fn request(
        &self,
        make: impl FnOnce(Reply) -> Command,
    ) -> Result<(), ConnectionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| ConnectionError::Unavailable)?;
        reply_rx.await.map_err(|_| ConnectionError::Unavailable)?
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct Actor<R: Relay> {
    relay: Arc<R>,
    policy: Arc<dyn ConnectionPolicy>,
    scenes: Option<SceneSynchronizer>,
    config: ConnectionConfig,
    fallback: FallbackSlot,
    events: broadcast::Sender<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    session_tx: watch::Sender<Option<SessionInfo>>,
    wake_tx: mpsc::UnboundedSender<Wake>,

    state: ConnectionState,
    generation: u64,
    /// The pre-start wait scheduled for the current generation.
    pending: Option<JoinHandle<()>>,
    /// A start request went out for the current generation and its
    /// outcome hasn't arrived.
    start_pending: bool,

    room: Option<RoomSpec>,
    region: String,
    /// Role of the current (or last) room connection.
    role: Option<Role>,
    switch_target: Role,
    local_id: Option<PeerId>,

    restore_retries: u32,
    escalated: bool,
    start_attempts: u32,
}

impl<R: Relay> Actor<R> {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut relay_events: mpsc::UnboundedReceiver<RelayEvent>,
        mut wakes: mpsc::UnboundedReceiver<Wake>,
    ) {
        tracing::debug!("connection actor started");

        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(event) = relay_events.recv() => self.handle_relay(event).await,
                Some(wake) = wakes.recv() => self.handle_wake(wake).await,
            }
        }

        if let Some(task) = self.pending.take() {
            task.abort();
        }
        tracing::debug!(state = %self.state, "connection actor stopped");
    }

    // -- Commands -----------------------------------------------------------

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Init {
                room,
                region,
                reply,
            } => {
                let result = self.cmd_init(room, region).await;
                let _ = reply.send(result);
            }
            Command::SwitchRoom {
                room,
                is_host,
                region,
                reply,
            } => {
                let result = self.cmd_switch_room(room, is_host, region).await;
                let _ = reply.send(result);
            }
            Command::GoToLobby { reply } => {
                let result = self.cmd_go_to_lobby().await;
                let _ = reply.send(result);
            }
            Command::Leave { reply } => {
                let result = self.cmd_leave().await;
                let _ = reply.send(result);
            }
            Command::SetRegion { region } => {
                tracing::debug!(%region, "region set");
                self.region = region;
            }
        }
    }

    async fn cmd_init(&mut self, room: String, region: String) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Disconnected => {
                self.target_room(room, region, Role::Host);
                self.begin(ConnectionState::StartingHost).await;
                Ok(())
            }
            ConnectionState::ConnectedToLobby => {
                self.target_room(room, region, Role::Host);
                self.begin(ConnectionState::SwitchingRoom).await;
                Ok(())
            }
            state => Err(ConnectionError::InvalidState { op: "init", state }),
        }
    }

    async fn cmd_switch_room(
        &mut self,
        room: String,
        is_host: bool,
        region: String,
    ) -> Result<(), ConnectionError> {
        let role = if is_host { Role::Host } else { Role::Client };
        match self.state {
            ConnectionState::Disconnected => {
                self.target_room(room, region, role);
                let next = match role {
                    Role::Host => ConnectionState::StartingHost,
                    Role::Client => ConnectionState::StartingClient,
                };
                self.begin(next).await;
                Ok(())
            }
            ConnectionState::Connected | ConnectionState::ConnectedToLobby => {
                self.target_room(room, region, role);
                self.begin(ConnectionState::SwitchingRoom).await;
                Ok(())
            }
            state => Err(ConnectionError::InvalidState {
                op: "switch room",
                state,
            }),
        }
    }

    async fn cmd_go_to_lobby(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::ConnectedToLobby | ConnectionState::StartingLobby => Ok(()),
            ConnectionState::Disconnected => {
                self.begin(ConnectionState::StartingLobby).await;
                Ok(())
            }
            ConnectionState::Connected => {
                self.begin(ConnectionState::SwitchingLobby).await;
                Ok(())
            }
            state => Err(ConnectionError::InvalidState {
                op: "go to lobby",
                state,
            }),
        }
    }

    async fn cmd_leave(&mut self) -> Result<(), ConnectionError> {
        match self.state {
            ConnectionState::Disconnected | ConnectionState::Disconnecting => Ok(()),
            _ => {
                self.begin(ConnectionState::Disconnecting).await;
                Ok(())
            }
        }
    }

    /// Enters `next` on behalf of a user command, with a fresh start budget.
    async fn begin(&mut self, next: ConnectionState) {
        self.start_attempts = 0;
        self.enter(next, false).await;
    }

    fn target_room(&mut self, room: String, region: String, role: Role) {
        self.room = Some(RoomSpec::new(room, region.clone()));
        self.region = region;
        self.switch_target = role;
    }

    // -- Relay events -------------------------------------------------------

    async fn handle_relay(&mut self, event: RelayEvent) {
        match event {
            RelayEvent::Connected { local_id } => {
                if self.start_pending {
                    self.local_id = Some(local_id);
                }
                self.handle_trigger(Trigger::Connected).await;
            }
            RelayEvent::Disconnected(reason) => {
                self.handle_trigger(Trigger::Disconnected(reason)).await;
            }
            RelayEvent::MasterSwitched => {
                self.handle_trigger(Trigger::MasterSwitched).await;
            }
            RelayEvent::PeerConnected(peer) => {
                self.forward(ConnectionEvent::PeerJoined(peer));
            }
            RelayEvent::PeerDisconnected(peer, reason) => {
                self.forward(ConnectionEvent::PeerLeft(peer, reason));
            }
            RelayEvent::Message { from, data } => {
                self.forward(ConnectionEvent::Message { from, data });
            }
        }
    }

    /// Room traffic only means something while connected to a room.
    fn forward(&self, event: ConnectionEvent) {
        if self.state == ConnectionState::Connected {
            self.emit(event);
        } else {
            tracing::debug!(state = %self.state, ?event, "dropping room event outside a room");
        }
    }

    // -- Wakes --------------------------------------------------------------

    async fn handle_wake(&mut self, wake: Wake) {
        match wake {
            Wake::StartReady {
                generation,
                outcome,
            } => {
                if generation != self.generation {
                    tracing::debug!(generation, current = self.generation, "discarding stale start");
                    return;
                }
                self.pending = None;
                match outcome {
                    Ok(()) => self.issue_start().await,
                    Err(e) => {
                        tracing::warn!(error = %e, state = %self.state, "start not ready");
                        self.start_pending = true;
                        self.handle_trigger(Trigger::StartFailed(ConnectionStatus::SceneNotLoaded))
                            .await;
                    }
                }
            }
            Wake::ShutdownLost { generation } => {
                if generation == self.generation {
                    self.handle_trigger(Trigger::Disconnected(DisconnectReason::LocalShutdown))
                        .await;
                }
            }
        }
    }

    async fn issue_start(&mut self) {
        let state = self.state;
        self.start_pending = true;

        let room = self.room.clone();

        let result = match (state, state.start_role(), room.as_ref()) {
            (ConnectionState::StartingLobby, _, _) => {
                tracing::info!(region = %self.region, "joining lobby");
                self.relay.join_lobby(&self.region).await
            }
            (_, Some(Role::Host), Some(room)) => {
                tracing::info!(%room, %state, "starting as host");
                self.relay.start_host(room).await
            }
            (_, Some(Role::Client), Some(room)) => {
                tracing::info!(%room, %state, "starting as client");
                let payload = self.policy.connect_payload();
                self.relay.start_client(room, &payload).await
            }
            _ => {
                tracing::error!(%state, "start requested with no target room");
                self.handle_trigger(Trigger::StartFailed(ConnectionStatus::Refused))
                    .await;
                return;
            }
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, %state, "relay rejected start");
            self.handle_trigger(Trigger::StartFailed(ConnectionStatus::Refused))
                .await;
        }
    }

    // -- Transitions --------------------------------------------------------

    fn facts(&self) -> Facts {
        Facts {
            role: self.role,
            eligible: self.policy.can_act_as_fallback_host(),
            is_fallback: self.local_id.is_some_and(|id| self.fallback.is(id)),
            start_pending: self.start_pending,
            restore_retries: self.restore_retries,
            max_restore_retries: self.config.max_restore_retries,
            escalated: self.escalated,
            start_attempts: self.start_attempts,
            max_start_attempts: self.config.max_start_attempts,
            switch_target: self.switch_target,
        }
    }

    async fn handle_trigger(&mut self, trigger: Trigger) {
        let step = transition::next_step(self.state, &trigger, &self.facts());

        match step {
            Step::Stay => {
                tracing::debug!(state = %self.state, ?trigger, "trigger ignored");
            }
            Step::Enter(next) => {
                self.start_attempts = 0;
                self.enter(next, false).await;
            }
            Step::RetryStart(next) => {
                self.start_attempts += 1;
                tracing::debug!(
                    attempt = self.start_attempts,
                    from = %self.state,
                    to = %next,
                    ?trigger,
                    "retrying start"
                );
                let backoff = next == self.state;
                self.enter(next, backoff).await;
            }
            Step::RetryRestore => {
                self.restore_retries += 1;
                tracing::info!(
                    retry = self.restore_retries,
                    max = self.config.max_restore_retries,
                    ?trigger,
                    "retrying restore as client"
                );
                self.enter(ConnectionState::RestoringClient, true).await;
            }
            Step::Escalate => {
                self.escalated = true;
                tracing::warn!("restore retries exhausted, trying to host instead");
                self.enter(ConnectionState::RestoringHost, false).await;
            }
            Step::Fail(status) => {
                tracing::warn!(
                    state = %self.state,
                    code = status.code(),
                    %status,
                    "connection failed"
                );
                self.emit(ConnectionEvent::RestoreFailed(status));
                self.enter(ConnectionState::Disconnected, false).await;
            }
        }
    }

    /// Moves to `next` and runs its entry actions. `backoff` delays a
    /// start by the configured retry wait.
    async fn enter(&mut self, next: ConnectionState, backoff: bool) {
        let from = self.state;

        if transition::resets_restore_budget(from, next) {
            self.restore_retries = 0;
            self.escalated = false;
        }

        self.generation += 1;
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.start_pending = false;

        self.state = next;
        self.state_tx.send_replace(next);
        if from != next {
            tracing::info!(%from, to = %next, "connection state changed");
            self.emit(ConnectionEvent::StateChanged { from, to: next });
        }

        if from == ConnectionState::Connected && next != ConnectionState::Connected {
            self.fallback.clear();
            self.session_tx.send_replace(None);
        }

        match next {
            s if s.is_starting() => self.schedule_start(backoff),
            s if s.awaits_disconnect() => {
                if let Err(e) = self.relay.shutdown().await {
                    tracing::warn!(error = %e, "relay shutdown failed");
                    let _ = self.wake_tx.send(Wake::ShutdownLost {
                        generation: self.generation,
                    });
                }
            }
            ConnectionState::Connected => self.announce_connected(from),
            ConnectionState::ConnectedToLobby => {
                self.role = None;
                if let Some(local_id) = self.local_id {
                    self.emit(ConnectionEvent::LobbyStarted {
                        local_id,
                        region: self.region.clone(),
                    });
                }
            }
            ConnectionState::Disconnected => {
                self.local_id = None;
                self.role = None;
                self.fallback.clear();
            }
            _ => {}
        }
    }

    fn announce_connected(&mut self, from: ConnectionState) {
        let Some(role) = from.start_role() else {
            return;
        };
        self.role = Some(role);

        let (Some(local_id), Some(room)) = (self.local_id, self.room.clone()) else {
            tracing::error!(%from, "connected without an id or room");
            return;
        };
        let info = SessionInfo {
            local_id,
            room,
            role,
        };
        tracing::info!(%local_id, room = %info.room, %role, "session established");
        self.session_tx.send_replace(Some(info.clone()));

        let event = match (from.is_restoring(), role) {
            (false, Role::Host) => ConnectionEvent::HostStarted(info),
            (false, Role::Client) => ConnectionEvent::ClientStarted(info),
            (true, Role::Host) => ConnectionEvent::HostRestored(info),
            (true, Role::Client) => ConnectionEvent::ClientRestored(info),
        };
        self.emit(event);
    }

    fn schedule_start(&mut self, backoff: bool) {
        let generation = self.generation;
        let wait = if backoff {
            self.config.backoff()
        } else {
            Duration::ZERO
        };
        // The lobby has no session scene.
        let scene = match (&self.scenes, &self.config.session_scene) {
            (Some(scenes), Some(name)) if self.state != ConnectionState::StartingLobby => {
                Some((scenes.clone(), name.clone()))
            }
            _ => None,
        };
        let wake_tx = self.wake_tx.clone();

        self.pending = Some(tokio::spawn(async move {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
            let outcome = match scene {
                Some((scenes, name)) => scenes.ensure_loaded(&name).await,
                None => Ok(()),
            };
            let _ = wake_tx.send(Wake::StartReady {
                generation,
                outcome,
            });
        }));
    }

    fn emit(&self, event: ConnectionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

//! In-process relay: every endpoint lives in the same process and shares
//! one [`RelayHub`].
//!
//! The hub mimics the relay behaviour the connection state machine cares
//! about: per-connection peer ids, one host per (region, name), room-name
//! conflicts, capacity limits, and the room vanishing with its host.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tether_protocol::{PeerId, Recipient};
use tokio::sync::mpsc;

use crate::{DisconnectReason, Relay, RelayEvent, RoomSpec, TransportError};

/// Default room capacity, host included.
const DEFAULT_MAX_PEERS: usize = 8;

type EndpointId = u64;

/// Where a connected endpoint currently is.
#[derive(Debug, Clone)]
enum Place {
    Host(RoomSpec),
    Client(RoomSpec),
    Lobby(String),
}

#[derive(Debug, Clone)]
struct Link {
    peer: PeerId,
    place: Place,
}

struct Endpoint {
    events: mpsc::UnboundedSender<RelayEvent>,
    link: Option<Link>,
}

struct HostedRoom {
    host: PeerId,
    clients: BTreeSet<PeerId>,
}

impl HostedRoom {
    fn members(&self) -> impl Iterator<Item = PeerId> + '_ {
        std::iter::once(self.host).chain(self.clients.iter().copied())
    }
}

struct HubState {
    next_peer_id: u64,
    next_endpoint: EndpointId,
    max_peers: usize,
    rooms: HashMap<RoomSpec, HostedRoom>,
    endpoints: HashMap<EndpointId, Endpoint>,
    /// Reverse index from the current connection's peer id.
    peers: HashMap<PeerId, EndpointId>,
}

impl HubState {
    fn allocate_peer(&mut self, endpoint: EndpointId) -> PeerId {
        let peer = PeerId(self.next_peer_id);
        self.next_peer_id += 1;
        self.peers.insert(peer, endpoint);
        peer
    }

    fn emit(&self, endpoint: EndpointId, event: RelayEvent) {
        if let Some(ep) = self.endpoints.get(&endpoint) {
            // A dropped receiver just means nobody listens any more.
            let _ = ep.events.send(event);
        }
    }

    fn emit_to_peer(&self, peer: PeerId, event: RelayEvent) {
        if let Some(endpoint) = self.peers.get(&peer) {
            self.emit(*endpoint, event);
        }
    }

    fn link(&self, endpoint: EndpointId) -> Option<&Link> {
        self.endpoints.get(&endpoint).and_then(|ep| ep.link.as_ref())
    }

    fn set_link(&mut self, endpoint: EndpointId, link: Option<Link>) {
        if let Some(ep) = self.endpoints.get_mut(&endpoint) {
            ep.link = link;
        }
    }

    /// Tears down the endpoint's connection and notifies everyone
    /// affected. `reason` is what the endpoint itself is told.
    fn detach(&mut self, endpoint: EndpointId, reason: DisconnectReason) {
        let Some(link) = self.link(endpoint).cloned() else {
            self.emit(endpoint, RelayEvent::Disconnected(reason));
            return;
        };
        self.set_link(endpoint, None);
        self.peers.remove(&link.peer);

        match &link.place {
            Place::Host(room) => {
                if let Some(hosted) = self.rooms.remove(room) {
                    tracing::info!(%room, host = %link.peer, "host left, room closed");
                    for client in hosted.clients {
                        self.emit_to_peer(client, RelayEvent::MasterSwitched);
                        self.emit_to_peer(
                            client,
                            RelayEvent::Disconnected(DisconnectReason::HostLeft),
                        );
                        if let Some(ep) = self.peers.remove(&client) {
                            self.set_link(ep, None);
                        }
                    }
                }
            }
            Place::Client(room) => {
                if let Some(hosted) = self.rooms.get_mut(room) {
                    hosted.clients.remove(&link.peer);
                    let host = hosted.host;
                    self.emit_to_peer(
                        host,
                        RelayEvent::PeerDisconnected(link.peer, reason.clone()),
                    );
                }
            }
            Place::Lobby(_) => {}
        }

        self.emit(endpoint, RelayEvent::Disconnected(reason));
    }
}

// ---------------------------------------------------------------------------
// RelayHub
// ---------------------------------------------------------------------------

/// The shared relay service. Cheap to clone; every clone is the same hub.
#[derive(Clone)]
pub struct RelayHub {
    state: Arc<Mutex<HubState>>,
}

impl RelayHub {
    /// Creates an empty hub with the default room capacity.
    pub fn new() -> Self {
        Self::with_max_peers(DEFAULT_MAX_PEERS)
    }

    /// Creates an empty hub whose rooms hold at most `max_peers` peers,
    /// host included.
    pub fn with_max_peers(max_peers: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(HubState {
                next_peer_id: 1,
                next_endpoint: 1,
                max_peers: max_peers.max(1),
                rooms: HashMap::new(),
                endpoints: HashMap::new(),
                peers: HashMap::new(),
            })),
        }
    }

    /// Opens a new endpoint. The receiver yields every event the relay
    /// sends to it.
    pub fn endpoint(&self) -> (LocalRelay, mpsc::UnboundedReceiver<RelayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = lock(&self.state);
        let id = state.next_endpoint;
        state.next_endpoint += 1;
        state.endpoints.insert(
            id,
            Endpoint {
                events: tx,
                link: None,
            },
        );
        (
            LocalRelay {
                state: Arc::clone(&self.state),
                endpoint: id,
            },
            rx,
        )
    }

    /// Makes the next connection receive `id`. Ids keep counting up from
    /// there. Lets tests reproduce specific join orders.
    pub fn set_next_peer_id(&self, id: u64) {
        lock(&self.state).next_peer_id = id;
    }

    /// The host of `room`, if it exists.
    pub fn host_of(&self, room: &RoomSpec) -> Option<PeerId> {
        lock(&self.state).rooms.get(room).map(|r| r.host)
    }

    /// Every peer in `room`, host first, then clients ascending.
    pub fn members(&self, room: &RoomSpec) -> Vec<PeerId> {
        lock(&self.state)
            .rooms
            .get(room)
            .map(|r| r.members().collect())
            .unwrap_or_default()
    }

    /// Simulates the relay losing track of `peer`: the peer is told
    /// `Timeout` and the rest of the room reacts as if it left.
    pub fn time_out(&self, peer: PeerId) {
        let mut state = lock(&self.state);
        if let Some(endpoint) = state.peers.get(&peer).copied() {
            tracing::debug!(%peer, "simulating relay timeout");
            state.detach(endpoint, DisconnectReason::Timeout);
        }
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(state: &Mutex<HubState>) -> MutexGuard<'_, HubState> {
    // The hub holds no invariants a panicking test could half-apply
    // that matter more than keeping other endpoints usable.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// LocalRelay
// ---------------------------------------------------------------------------

/// One endpoint on a [`RelayHub`].
pub struct LocalRelay {
    state: Arc<Mutex<HubState>>,
    endpoint: EndpointId,
}

impl LocalRelay {
    fn ensure_idle(state: &HubState, endpoint: EndpointId) -> Result<(), TransportError> {
        match state.link(endpoint) {
            Some(link) => Err(TransportError::AlreadyConnected(link.peer)),
            None => Ok(()),
        }
    }
}

impl Relay for LocalRelay {
    async fn start_host(&self, room: &RoomSpec) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        Self::ensure_idle(&state, self.endpoint)?;

        if state.rooms.contains_key(room) {
            tracing::debug!(%room, "host start refused, name taken");
            state.emit(
                self.endpoint,
                RelayEvent::Disconnected(DisconnectReason::RoomNameConflict),
            );
            return Ok(());
        }

        let peer = state.allocate_peer(self.endpoint);
        state.rooms.insert(
            room.clone(),
            HostedRoom {
                host: peer,
                clients: BTreeSet::new(),
            },
        );
        state.set_link(
            self.endpoint,
            Some(Link {
                peer,
                place: Place::Host(room.clone()),
            }),
        );
        tracing::info!(%room, %peer, "room hosted");
        state.emit(self.endpoint, RelayEvent::Connected { local_id: peer });
        Ok(())
    }

    async fn start_client(
        &self,
        room: &RoomSpec,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        Self::ensure_idle(&state, self.endpoint)?;

        let max_peers = state.max_peers;
        let host = match state.rooms.get(room) {
            None => {
                state.emit(
                    self.endpoint,
                    RelayEvent::Disconnected(DisconnectReason::RoomNotFound),
                );
                return Ok(());
            }
            Some(hosted) if hosted.clients.len() + 1 >= max_peers => {
                state.emit(
                    self.endpoint,
                    RelayEvent::Disconnected(DisconnectReason::RoomFull),
                );
                return Ok(());
            }
            Some(hosted) => hosted.host,
        };

        let peer = state.allocate_peer(self.endpoint);
        if let Some(hosted) = state.rooms.get_mut(room) {
            hosted.clients.insert(peer);
        }
        state.set_link(
            self.endpoint,
            Some(Link {
                peer,
                place: Place::Client(room.clone()),
            }),
        );
        tracing::debug!(%room, %peer, payload_len = payload.len(), "client joined");
        state.emit(self.endpoint, RelayEvent::Connected { local_id: peer });
        state.emit_to_peer(host, RelayEvent::PeerConnected(peer));
        Ok(())
    }

    async fn join_lobby(&self, region: &str) -> Result<(), TransportError> {
        let mut state = lock(&self.state);
        Self::ensure_idle(&state, self.endpoint)?;

        let peer = state.allocate_peer(self.endpoint);
        state.set_link(
            self.endpoint,
            Some(Link {
                peer,
                place: Place::Lobby(region.to_string()),
            }),
        );
        state.emit(self.endpoint, RelayEvent::Connected { local_id: peer });
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        lock(&self.state).detach(self.endpoint, DisconnectReason::LocalShutdown);
        Ok(())
    }

    async fn send(&self, to: Recipient, data: &[u8]) -> Result<(), TransportError> {
        let state = lock(&self.state);
        let link = state.link(self.endpoint).ok_or(TransportError::NotConnected)?;
        let room = match &link.place {
            Place::Host(room) | Place::Client(room) => room,
            Place::Lobby(_) => return Err(TransportError::NotConnected),
        };
        let hosted = state.rooms.get(room).ok_or(TransportError::NotConnected)?;

        let sender = link.peer;
        for peer in hosted.members().filter(|p| to.includes(*p, sender)) {
            state.emit_to_peer(
                peer,
                RelayEvent::Message {
                    from: sender,
                    data: data.to_vec(),
                },
            );
        }
        Ok(())
    }

    fn local_peer(&self) -> Option<PeerId> {
        lock(&self.state).link(self.endpoint).map(|l| l.peer)
    }

    fn connected_peers(&self) -> Vec<PeerId> {
        let state = lock(&self.state);
        let Some(link) = state.link(self.endpoint) else {
            return Vec::new();
        };
        match &link.place {
            Place::Host(room) | Place::Client(room) => state
                .rooms
                .get(room)
                .map(|r| r.members().filter(|p| *p != link.peer).collect())
                .unwrap_or_default(),
            Place::Lobby(_) => Vec::new(),
        }
    }
}

impl Drop for LocalRelay {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        if state.link(self.endpoint).is_some() {
            state.detach(self.endpoint, DisconnectReason::LocalShutdown);
        }
        state.endpoints.remove(&self.endpoint);
    }
}

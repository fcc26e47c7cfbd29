//! The session coordinator: host side and replica side.
//!
//! The host elects the fallback host and owns the session metadata. Every
//! change goes out as a sequenced [`Envelope`]. Replicas apply those in
//! order and drop anything older than what they already hold. Both sides
//! publish the current fallback into the connection machine's
//! [`FallbackSlot`], which is what the machine consults when the host
//! disappears.

use std::collections::BTreeSet;

use tether_connection::FallbackSlot;
use tether_protocol::{CoordinatorMessage, Envelope, PeerId, Recipient};
use tether_transport::RoomSpec;

use crate::{CoordinatorError, SessionMetadata, channel_name_for, lowest_candidate};

/// An RPC the caller should send, and to whom.
pub type Outbound = (Recipient, Envelope);

/// What applying one update changed on a replica.
///
/// Only [`Fallback`](Applied::Fallback) and
/// [`ChannelName`](Applied::ChannelName) report a change, so callers can
/// fire their notifications on those alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// The fallback host changed to this. `None` means no peer is
    /// eligible any more.
    Fallback(Option<PeerId>),
    /// The session's channel name arrived for the first time.
    ChannelName(String),
    /// Older than something already applied. Dropped.
    Stale,
    /// Newer, but nothing changed: the fallback we already had, the
    /// channel name again, or a conflicting channel name.
    Unchanged,
}

enum Side {
    Host {
        next_seq: u64,
        /// Peers whose join we've processed.
        peers: BTreeSet<PeerId>,
    },
    Replica {
        /// Who we take updates from. Learned from the first update.
        host: Option<PeerId>,
        last_seq: u64,
    },
}

/// One session's election state and metadata.
///
/// Created when a peer starts or restores a session, dropped when that
/// session ends, so nothing carries over between consecutive sessions.
pub struct SessionCoordinator {
    local: PeerId,
    metadata: SessionMetadata,
    slot: FallbackSlot,
    side: Side,
}

impl SessionCoordinator {
    /// The host's coordinator for `room`. The channel name is derived from
    /// the room's region and `lobby_id` and never changes afterwards.
    pub fn host(local: PeerId, room: &RoomSpec, lobby_id: &str, slot: FallbackSlot) -> Self {
        let channel = channel_name_for(&room.region, lobby_id);
        tracing::info!(%local, %room, %channel, "session coordinator created");
        slot.clear();
        Self {
            local,
            metadata: SessionMetadata::new(room, Some(channel)),
            slot,
            side: Side::Host {
                next_seq: 1,
                peers: BTreeSet::new(),
            },
        }
    }

    /// A replica for a client connected to `room`.
    ///
    /// It follows whichever peer sends the first update and rejects
    /// updates from anyone else afterwards. The fallback and channel name
    /// stay unknown until the host sends them.
    pub fn replica(local: PeerId, room: &RoomSpec, slot: FallbackSlot) -> Self {
        tracing::debug!(%local, %room, "session replica created");
        Self {
            local,
            metadata: SessionMetadata::new(room, None),
            slot,
            side: Side::Replica {
                host: None,
                last_seq: 0,
            },
        }
    }

    /// This peer's relay id in the session.
    pub fn local(&self) -> PeerId {
        self.local
    }

    /// `true` for the coordinator created with [`host`](Self::host).
    pub fn is_host(&self) -> bool {
        matches!(self.side, Side::Host { .. })
    }

    pub fn metadata(&self) -> &SessionMetadata {
        &self.metadata
    }

    /// The current fallback host. Always equal to what the slot holds.
    pub fn fallback(&self) -> Option<PeerId> {
        self.metadata.fallback_host
    }

    /// The voice channel name. Known from creation on the host, and from
    /// the first `ChannelName` update on a replica.
    pub fn channel_name(&self) -> Option<&str> {
        self.metadata.channel_name.as_deref()
    }

    /// Whether the latest election named this peer.
    pub fn is_fallback(&self) -> bool {
        self.metadata.fallback_host == Some(self.local)
    }

    // -- Host ---------------------------------------------------------------

    /// Runs the election for a newly joined peer.
    ///
    /// Always tells the newcomer the channel name. A repeated join of a
    /// known peer only repeats what that peer should already know.
    ///
    /// # Errors
    /// [`CoordinatorError::NotHost`] on a replica.
    pub fn on_peer_joined(&mut self, peer: PeerId) -> Result<Vec<Outbound>, CoordinatorError> {
        let Side::Host { peers, .. } = &mut self.side else {
            return Err(CoordinatorError::NotHost("handle joins"));
        };
        if peer == self.local {
            return Ok(Vec::new());
        }

        let is_new = peers.insert(peer);
        let lower = self.metadata.fallback_host.is_none_or(|current| peer < current);

        let mut out = Vec::with_capacity(2);
        if is_new && lower {
            tracing::info!(%peer, previous = ?self.metadata.fallback_host, "new fallback host");
            self.set_fallback(Some(peer));
            let msg = CoordinatorMessage::FallbackHost {
                fallback: Some(peer),
            };
            out.push((Recipient::All, self.stamp(msg)));
        } else {
            tracing::debug!(%peer, fallback = ?self.metadata.fallback_host, "fallback unchanged");
            let msg = CoordinatorMessage::FallbackHost {
                fallback: self.metadata.fallback_host,
            };
            out.push((Recipient::Peer(peer), self.stamp(msg)));
        }

        if let Some(name) = self.metadata.channel_name.clone() {
            out.push((
                Recipient::Peer(peer),
                self.stamp(CoordinatorMessage::ChannelName { name }),
            ));
        }
        Ok(out)
    }

    /// Handles a departure. `connected` is every peer still in the room
    /// according to the relay.
    ///
    /// Only the fallback's departure triggers a rescan and a broadcast.
    ///
    /// # Errors
    /// [`CoordinatorError::NotHost`] on a replica.
    pub fn on_peer_left(
        &mut self,
        peer: PeerId,
        connected: impl IntoIterator<Item = PeerId>,
    ) -> Result<Vec<Outbound>, CoordinatorError> {
        let Side::Host { peers, .. } = &mut self.side else {
            return Err(CoordinatorError::NotHost("handle departures"));
        };
        peers.remove(&peer);

        if self.metadata.fallback_host != Some(peer) {
            tracing::debug!(%peer, "non-fallback peer left");
            return Ok(Vec::new());
        }

        let next = lowest_candidate(connected, self.local, Some(peer));
        tracing::info!(departed = %peer, fallback = ?next, "fallback host left, re-elected");
        self.set_fallback(next);
        let msg = CoordinatorMessage::FallbackHost { fallback: next };
        Ok(vec![(Recipient::All, self.stamp(msg))])
    }

    fn stamp(&mut self, message: CoordinatorMessage) -> Envelope {
        let seq = match &mut self.side {
            Side::Host { next_seq, .. } => {
                let seq = *next_seq;
                *next_seq += 1;
                seq
            }
            Side::Replica { .. } => 0,
        };
        Envelope { seq, message }
    }

    // -- Replica ------------------------------------------------------------

    /// Applies an update the host sent.
    ///
    /// Updates with a sequence number at or below the last applied one
    /// are [`Stale`](Applied::Stale). A fallback update that repeats the
    /// current fallback is [`Unchanged`](Applied::Unchanged) and leaves
    /// the slot alone.
    ///
    /// # Errors
    /// - [`CoordinatorError::NotReplica`] on the host.
    /// - [`CoordinatorError::WrongSender`] if `from` isn't the host this
    ///   replica follows.
    /// - [`CoordinatorError::Protocol`] for a malformed envelope.
    pub fn apply(&mut self, from: PeerId, envelope: Envelope) -> Result<Applied, CoordinatorError> {
        let Side::Replica { host, last_seq } = &mut self.side else {
            return Err(CoordinatorError::NotReplica("apply updates"));
        };
        envelope.validate()?;

        match *host {
            Some(known) if known != from => {
                return Err(CoordinatorError::WrongSender { from, host: known });
            }
            Some(_) => {}
            None => *host = Some(from),
        }

        if envelope.seq <= *last_seq {
            tracing::debug!(seq = envelope.seq, last = *last_seq, "dropping stale update");
            return Ok(Applied::Stale);
        }
        *last_seq = envelope.seq;

        match envelope.message {
            CoordinatorMessage::FallbackHost { fallback } => {
                if fallback == self.metadata.fallback_host {
                    return Ok(Applied::Unchanged);
                }
                if fallback == Some(self.local) && !self.is_fallback() {
                    tracing::warn!(local = %self.local, "this peer is now the fallback host");
                }
                self.set_fallback(fallback);
                Ok(Applied::Fallback(fallback))
            }
            CoordinatorMessage::ChannelName { name } => match &self.metadata.channel_name {
                None => {
                    tracing::debug!(channel = %name, "channel name received");
                    self.metadata.channel_name = Some(name.clone());
                    Ok(Applied::ChannelName(name))
                }
                Some(current) if *current == name => Ok(Applied::Unchanged),
                Some(current) => {
                    tracing::warn!(%current, ignored = %name, "conflicting channel name ignored");
                    Ok(Applied::Unchanged)
                }
            },
        }
    }

    fn set_fallback(&mut self, fallback: Option<PeerId>) {
        self.metadata.fallback_host = fallback;
        self.slot.publish(fallback);
    }
}

impl Drop for SessionCoordinator {
    fn drop(&mut self) {
        tracing::debug!(local = %self.local, host = self.is_host(), "session coordinator dropped");
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomSpec {
        RoomSpec::new("R1", "eu")
    }

    fn host() -> SessionCoordinator {
        SessionCoordinator::host(PeerId(1), &room(), "lobby", FallbackSlot::new())
    }

    fn fallback_of(out: &[Outbound]) -> Vec<(Recipient, Option<PeerId>)> {
        out.iter()
            .filter_map(|(to, env)| match env.message {
                CoordinatorMessage::FallbackHost { fallback } => Some((*to, fallback)),
                _ => None,
            })
            .collect()
    }

    // =====================================================================
    // Host
    // =====================================================================

    #[test]
    fn test_host_alone_has_no_fallback() {
        let coord = host();
        assert_eq!(coord.fallback(), None);
        assert_eq!(coord.channel_name(), Some("eu-lobby"));
    }

    #[test]
    fn test_on_peer_joined_lowest_wins_in_join_order() {
        let mut coord = host();

        let first = coord.on_peer_joined(PeerId(7)).unwrap();
        assert_eq!(fallback_of(&first), vec![(Recipient::All, Some(PeerId(7)))]);

        let lower = coord.on_peer_joined(PeerId(3)).unwrap();
        assert_eq!(fallback_of(&lower), vec![(Recipient::All, Some(PeerId(3)))]);

        let higher = coord.on_peer_joined(PeerId(5)).unwrap();
        assert_eq!(
            fallback_of(&higher),
            vec![(Recipient::Peer(PeerId(5)), Some(PeerId(3)))]
        );
        assert_eq!(coord.fallback(), Some(PeerId(3)));
    }

    #[test]
    fn test_on_peer_left_fallback_rescans_connected() {
        let mut coord = host();
        for id in [7, 3, 5] {
            coord.on_peer_joined(PeerId(id)).unwrap();
        }

        let out = coord
            .on_peer_left(PeerId(3), [PeerId(5), PeerId(7)])
            .unwrap();

        assert_eq!(fallback_of(&out), vec![(Recipient::All, Some(PeerId(5)))]);
        assert_eq!(coord.fallback(), Some(PeerId(5)));
    }

    #[test]
    fn test_on_peer_left_non_fallback_changes_nothing() {
        let mut coord = host();
        coord.on_peer_joined(PeerId(3)).unwrap();
        coord.on_peer_joined(PeerId(5)).unwrap();

        let out = coord.on_peer_left(PeerId(5), [PeerId(3)]).unwrap();

        assert!(out.is_empty());
        assert_eq!(coord.fallback(), Some(PeerId(3)));
    }

    #[test]
    fn test_on_peer_left_last_peer_broadcasts_none() {
        let mut coord = host();
        coord.on_peer_joined(PeerId(4)).unwrap();

        let out = coord.on_peer_left(PeerId(4), std::iter::empty()).unwrap();

        assert_eq!(fallback_of(&out), vec![(Recipient::All, None)]);
        assert_eq!(coord.fallback(), None);
    }

    #[test]
    fn test_on_peer_left_ignores_departing_in_connected_list() {
        // The relay may still list the departing peer.
        let mut coord = host();
        coord.on_peer_joined(PeerId(2)).unwrap();
        coord.on_peer_joined(PeerId(6)).unwrap();

        coord
            .on_peer_left(PeerId(2), [PeerId(1), PeerId(2), PeerId(6)])
            .unwrap();

        assert_eq!(coord.fallback(), Some(PeerId(6)));
    }

    #[test]
    fn test_on_peer_joined_repeat_only_unicasts() {
        let mut coord = host();
        coord.on_peer_joined(PeerId(3)).unwrap();

        let again = coord.on_peer_joined(PeerId(3)).unwrap();

        assert!(again.iter().all(|(to, _)| *to == Recipient::Peer(PeerId(3))));
        assert_eq!(fallback_of(&again), vec![(Recipient::Peer(PeerId(3)), Some(PeerId(3)))]);
    }

    #[test]
    fn test_on_peer_joined_always_unicasts_channel_name() {
        let mut coord = host();

        let out = coord.on_peer_joined(PeerId(9)).unwrap();

        assert!(out.iter().any(|(to, env)| *to == Recipient::Peer(PeerId(9))
            && env.message
                == CoordinatorMessage::ChannelName {
                    name: "eu-lobby".into()
                }));
    }

    #[test]
    fn test_on_peer_joined_stamps_increasing_seq() {
        let mut coord = host();
        let mut seqs: Vec<u64> = Vec::new();
        for id in [4, 2, 8] {
            seqs.extend(
                coord
                    .on_peer_joined(PeerId(id))
                    .unwrap()
                    .iter()
                    .map(|(_, e)| e.seq),
            );
        }
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seqs[0], 1);
    }

    #[test]
    fn test_on_peer_joined_publishes_to_slot() {
        let slot = FallbackSlot::new();
        let mut coord = SessionCoordinator::host(PeerId(1), &room(), "lobby", slot.clone());

        coord.on_peer_joined(PeerId(6)).unwrap();

        assert_eq!(slot.current(), Some(PeerId(6)));
    }

    #[test]
    fn test_host_rejects_apply() {
        let mut coord = host();
        let env = Envelope {
            seq: 1,
            message: CoordinatorMessage::FallbackHost { fallback: None },
        };
        assert!(matches!(
            coord.apply(PeerId(2), env),
            Err(CoordinatorError::NotReplica(_))
        ));
    }

    // =====================================================================
    // Replica
    // =====================================================================

    fn replica(local: u64) -> SessionCoordinator {
        SessionCoordinator::replica(PeerId(local), &room(), FallbackSlot::new())
    }

    fn update(seq: u64, fallback: Option<u64>) -> Envelope {
        Envelope {
            seq,
            message: CoordinatorMessage::FallbackHost {
                fallback: fallback.map(PeerId),
            },
        }
    }

    #[test]
    fn test_apply_fallback_naming_self_flags_fallback() {
        let slot = FallbackSlot::new();
        let mut coord = SessionCoordinator::replica(PeerId(3), &room(), slot.clone());

        let applied = coord.apply(PeerId(1), update(1, Some(3))).unwrap();

        assert_eq!(applied, Applied::Fallback(Some(PeerId(3))));
        assert!(coord.is_fallback());
        assert!(slot.is(PeerId(3)));
    }

    #[test]
    fn test_apply_same_fallback_again_is_unchanged() {
        let slot = FallbackSlot::new();
        let mut coord = SessionCoordinator::replica(PeerId(4), &room(), slot.clone());
        coord.apply(PeerId(1), update(1, Some(3))).unwrap();

        let applied = coord.apply(PeerId(1), update(2, Some(3))).unwrap();

        assert_eq!(applied, Applied::Unchanged);
        assert_eq!(coord.fallback(), Some(PeerId(3)));
        assert!(slot.is(PeerId(3)));
        assert_eq!(
            coord.apply(PeerId(1), update(3, Some(2))).unwrap(),
            Applied::Fallback(Some(PeerId(2)))
        );
    }

    #[test]
    fn test_apply_no_fallback_before_any_is_unchanged() {
        let mut coord = replica(4);
        assert_eq!(
            coord.apply(PeerId(1), update(1, None)).unwrap(),
            Applied::Unchanged
        );
        assert_eq!(
            coord.apply(PeerId(1), update(2, Some(4))).unwrap(),
            Applied::Fallback(Some(PeerId(4)))
        );
        assert_eq!(
            coord.apply(PeerId(1), update(3, None)).unwrap(),
            Applied::Fallback(None)
        );
    }

    #[test]
    fn test_apply_drops_stale_seq() {
        let mut coord = replica(5);
        coord.apply(PeerId(1), update(4, Some(3))).unwrap();

        let applied = coord.apply(PeerId(1), update(2, Some(7))).unwrap();

        assert_eq!(applied, Applied::Stale);
        assert_eq!(coord.fallback(), Some(PeerId(3)));
    }

    #[test]
    fn test_apply_rejects_other_sender() {
        let mut coord = replica(5);
        coord.apply(PeerId(1), update(1, Some(5))).unwrap();

        let err = coord.apply(PeerId(2), update(2, None)).unwrap_err();

        assert!(matches!(err, CoordinatorError::WrongSender { .. }));
    }

    #[test]
    fn test_apply_rejects_invalid_envelope() {
        let mut coord = replica(5);
        let err = coord.apply(PeerId(1), update(0, None)).unwrap_err();
        assert!(matches!(err, CoordinatorError::Protocol(_)));
    }

    #[test]
    fn test_apply_channel_name_set_once() {
        let mut coord = replica(5);
        let name = |seq, n: &str| Envelope {
            seq,
            message: CoordinatorMessage::ChannelName { name: n.into() },
        };

        assert_eq!(
            coord.apply(PeerId(1), name(1, "eu-lobby")).unwrap(),
            Applied::ChannelName("eu-lobby".into())
        );
        assert_eq!(
            coord.apply(PeerId(1), name(2, "us-other")).unwrap(),
            Applied::Unchanged
        );
        assert_eq!(coord.channel_name(), Some("eu-lobby"));
    }

    #[test]
    fn test_replica_rejects_host_operations() {
        let mut coord = replica(5);
        assert!(matches!(
            coord.on_peer_joined(PeerId(6)),
            Err(CoordinatorError::NotHost(_))
        ));
        assert!(matches!(
            coord.on_peer_left(PeerId(6), std::iter::empty()),
            Err(CoordinatorError::NotHost(_))
        ));
    }
}

//! Session-wide metadata owned by the host.

use serde::{Deserialize, Serialize};
use tether_protocol::PeerId;
use tether_transport::RoomSpec;

/// What every peer in a session should agree on.
///
/// The host's coordinator is the only writer. Replicas hold a read-only
/// copy built from the host's updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Who takes over if the host disappears. `None` while the host is
    /// alone.
    pub fallback_host: Option<PeerId>,
    /// Name of the session's voice channel. Set once by the host. `None`
    /// on a replica until the host has sent it.
    pub channel_name: Option<String>,
    pub room_name: String,
    pub region: String,
}

impl SessionMetadata {
    pub(crate) fn new(room: &RoomSpec, channel_name: Option<String>) -> Self {
        Self {
            fallback_host: None,
            channel_name,
            room_name: room.name.clone(),
            region: room.region.clone(),
        }
    }
}

/// The channel name a host derives for its session: `"{region}-{lobby}"`.
pub fn channel_name_for(region: &str, lobby_id: &str) -> String {
    format!("{region}-{lobby_id}")
}

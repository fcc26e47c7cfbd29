//! The election rule.

use tether_protocol::PeerId;

/// The lowest id in `connected`, ignoring `host` and `departing`.
///
/// This is the fallback a host recomputes when its fallback leaves.
/// `None` when nobody else is left.
pub fn lowest_candidate(
    connected: impl IntoIterator<Item = PeerId>,
    host: PeerId,
    departing: Option<PeerId>,
) -> Option<PeerId> {
    connected
        .into_iter()
        .filter(|p| *p != host && Some(*p) != departing)
        .min()
}

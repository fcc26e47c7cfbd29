//! The presence tracker: destination lookups plus the local peer's
//! advertised presence.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{Destination, DestinationDirectory, PresenceError, StaticDirectory};

/// What the platform advertises so friends can find and join us.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceDescriptor {
    /// Destination `api_name`.
    pub destination: String,
    /// Groups peers that should end up in the same lobby.
    pub lobby_session_id: String,
    /// Groups peers that should end up in the same match.
    pub match_session_id: String,
    /// Whether others may join through this presence.
    pub joinable: bool,
}

/// Resolves destinations and tracks the local peer's presence.
///
/// Starts from a fallback table and replaces it with the directory's
/// answer on a successful [`refresh`](Self::refresh). A failed refresh is
/// logged and the previous table stays.
pub struct PresenceTracker {
    by_name: HashMap<String, Destination>,
    /// region → api_name. First entry per region wins.
    by_region: HashMap<String, String>,
    current: Option<PresenceDescriptor>,
}

impl PresenceTracker {
    /// A tracker that knows the destinations in `fallback`.
    pub fn new(fallback: &StaticDirectory) -> Self {
        let mut tracker = Self {
            by_name: HashMap::new(),
            by_region: HashMap::new(),
            current: None,
        };
        tracker.load(fallback.entries().to_vec());
        tracker
    }

    fn load(&mut self, destinations: Vec<Destination>) {
        self.by_name.clear();
        self.by_region.clear();
        for dest in destinations {
            self.by_region
                .entry(dest.region.clone())
                .or_insert_with(|| dest.api_name.clone());
            self.by_name.insert(dest.api_name.clone(), dest);
        }
    }

    /// Replaces the table with what `directory` reports.
    ///
    /// Returns `false`, keeping the current table, if the directory
    /// failed or returned nothing.
    pub async fn refresh<D: DestinationDirectory>(&mut self, directory: &D) -> bool {
        match directory.destinations().await {
            Ok(destinations) if !destinations.is_empty() => {
                tracing::debug!(count = destinations.len(), "destination table refreshed");
                self.load(destinations);
                true
            }
            Ok(_) => {
                tracing::warn!("destination directory returned no entries, keeping table");
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "destination directory failed, keeping table");
                false
            }
        }
    }

    pub fn display_name(&self, destination: &str) -> Option<&str> {
        self.by_name
            .get(destination)
            .map(|d| d.display_name.as_str())
    }

    pub fn region(&self, destination: &str) -> Option<&str> {
        self.by_name.get(destination).map(|d| d.region.as_str())
    }

    /// The destination that matches are hosted under in `region`.
    pub fn destination_for_region(&self, region: &str) -> Option<&str> {
        self.by_region.get(region).map(String::as_str)
    }

    /// Builds a new descriptor for `destination` with fresh session ids.
    ///
    /// # Errors
    /// [`PresenceError::UnknownDestination`] if the table doesn't list it.
    pub fn describe(
        &self,
        destination: &str,
        joinable: bool,
    ) -> Result<PresenceDescriptor, PresenceError> {
        if !self.by_name.contains_key(destination) {
            return Err(PresenceError::UnknownDestination(destination.to_string()));
        }
        Ok(PresenceDescriptor {
            destination: destination.to_string(),
            lobby_session_id: session_id(),
            match_session_id: session_id(),
            joinable,
        })
    }

    /// Records that the local peer joined under `descriptor`.
    pub fn join(&mut self, descriptor: PresenceDescriptor) {
        tracing::info!(destination = %descriptor.destination, joinable = descriptor.joinable, "presence set");
        self.current = Some(descriptor);
    }

    /// Clears the local presence. Returns what was advertised.
    pub fn leave(&mut self) -> Option<PresenceDescriptor> {
        let previous = self.current.take();
        if previous.is_some() {
            tracing::info!("presence cleared");
        }
        previous
    }

    pub fn current(&self) -> Option<&PresenceDescriptor> {
        self.current.as_ref()
    }
}

fn session_id() -> String {
    format!("{:016x}", rand::rng().random::<u64>())
}

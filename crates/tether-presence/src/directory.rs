//! Destination directories: the live service and a static table.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::PresenceError;

/// One entry in the destination directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// Stable identifier used in deep links, e.g. `"arena_eu"`.
    pub api_name: String,
    /// Human-readable name, e.g. `"Arena (Europe)"`.
    pub display_name: String,
    /// Relay region code, e.g. `"eu"`.
    pub region: String,
}

impl Destination {
    pub fn new(
        api_name: impl Into<String>,
        display_name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            api_name: api_name.into(),
            display_name: display_name.into(),
            region: region.into(),
        }
    }
}

/// The platform's destination directory.
pub trait DestinationDirectory: Send + Sync {
    /// Every destination the application has registered.
    fn destinations(
        &self,
    ) -> impl Future<Output = Result<Vec<Destination>, PresenceError>> + Send;
}

/// A fixed destination table, for environments without a directory
/// service and as the tracker's fallback.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    destinations: Vec<Destination>,
}

impl StaticDirectory {
    pub fn new(destinations: Vec<Destination>) -> Self {
        Self { destinations }
    }

    /// Parses a JSON array of destinations:
    ///
    /// ```json
    /// [{ "api_name": "arena_eu", "display_name": "Arena (Europe)", "region": "eu" }]
    /// ```
    ///
    /// # Errors
    /// [`PresenceError::Parse`] if the JSON doesn't match.
    pub fn from_json(json: &str) -> Result<Self, PresenceError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    pub fn entries(&self) -> &[Destination] {
        &self.destinations
    }
}

impl DestinationDirectory for StaticDirectory {
    async fn destinations(&self) -> Result<Vec<Destination>, PresenceError> {
        Ok(self.destinations.clone())
    }
}

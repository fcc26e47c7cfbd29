//! Session wiring configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for [`SessionWiring`](crate::SessionWiring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WiringConfig {
    /// How long the host waits for `local_ready` before creating its
    /// coordinator anyway. Joins arriving meanwhile wait at most this long.
    pub coordinator_wait: Duration,

    /// Lobby id the host combines with its region into the channel name.
    pub lobby_id: String,
}

impl Default for WiringConfig {
    fn default() -> Self {
        Self {
            coordinator_wait: Duration::from_secs(5),
            lobby_id: "lobby".to_string(),
        }
    }
}

impl WiringConfig {
    /// Longest allowed `coordinator_wait`.
    pub const MAX_COORDINATOR_WAIT: Duration = Duration::from_secs(60);

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// - `coordinator_wait` capped to [`Self::MAX_COORDINATOR_WAIT`].
    /// - An empty `lobby_id` becomes `"lobby"`, since the channel name
    ///   must not end in a bare dash.
    pub fn validated(mut self) -> Self {
        if self.coordinator_wait > Self::MAX_COORDINATOR_WAIT {
            tracing::warn!(
                wait = ?self.coordinator_wait,
                max = ?Self::MAX_COORDINATOR_WAIT,
                "coordinator_wait exceeds maximum, clamping"
            );
            self.coordinator_wait = Self::MAX_COORDINATOR_WAIT;
        }
        if self.lobby_id.is_empty() {
            self.lobby_id = "lobby".to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validated_clamps_wait_and_fills_lobby() {
        let config = WiringConfig {
            coordinator_wait: Duration::from_secs(3_600),
            lobby_id: String::new(),
        }
        .validated();

        assert_eq!(config.coordinator_wait, WiringConfig::MAX_COORDINATOR_WAIT);
        assert_eq!(config.lobby_id, "lobby");
    }

    #[test]
    fn test_config_json_round_trip_keeps_lobby() {
        let json = r#"{"coordinator_wait":{"secs":2,"nanos":0},"lobby_id":"l-9"}"#;
        let config: WiringConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.coordinator_wait, Duration::from_secs(2));
        assert_eq!(config.lobby_id, "l-9");
    }
}

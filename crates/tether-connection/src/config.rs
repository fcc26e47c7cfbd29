//! Connection machine configuration.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::SceneConfig;

/// Tunables for one [`ConnectionStateMachine`](crate::ConnectionStateMachine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Retries `RestoringClient` gets before escalating or failing (N).
    pub max_restore_retries: u32,

    /// Total start attempts (host, client or lobby) per user command.
    pub max_start_attempts: u32,

    /// Base wait before repeating a failed start.
    pub retry_delay: Duration,

    /// Random extra wait (0 to this) added to `retry_delay`, so peers that
    /// lost the same host don't retry in lockstep.
    pub retry_jitter: Duration,

    /// Scene that must be loaded before any host/client start. `None`
    /// skips the readiness wait.
    pub session_scene: Option<String>,

    /// How the readiness wait polls.
    pub scene: SceneConfig,

    /// Capacity of the command channel.
    pub command_buffer: usize,

    /// Capacity of the event broadcast. Slow subscribers past this many
    /// events lag and skip.
    pub event_buffer: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_restore_retries: 3,
            max_start_attempts: 5,
            retry_delay: Duration::from_millis(500),
            retry_jitter: Duration::from_millis(250),
            session_scene: None,
            scene: SceneConfig::default(),
            command_buffer: 32,
            event_buffer: 256,
        }
    }
}

impl ConnectionConfig {
    /// Upper bound for `max_restore_retries`.
    pub const MAX_RESTORE_RETRIES: u32 = 32;

    /// Clamp and fix any out-of-range values so the config is safe to use.
    ///
    /// Called by [`ConnectionStateMachine::spawn`](crate::ConnectionStateMachine::spawn).
    /// Rules:
    /// - `max_restore_retries` capped to [`Self::MAX_RESTORE_RETRIES`].
    /// - `max_start_attempts` at least 1 (0 would fail before trying).
    /// - Channel capacities at least 1.
    pub fn validated(mut self) -> Self {
        if self.max_restore_retries > Self::MAX_RESTORE_RETRIES {
            tracing::warn!(
                retries = self.max_restore_retries,
                max = Self::MAX_RESTORE_RETRIES,
                "max_restore_retries exceeds maximum, clamping"
            );
            self.max_restore_retries = Self::MAX_RESTORE_RETRIES;
        }
        self.max_start_attempts = self.max_start_attempts.max(1);
        self.command_buffer = self.command_buffer.max(1);
        self.event_buffer = self.event_buffer.max(1);
        self.scene = self.scene.validated();
        self
    }

    /// The wait before a repeated start: `retry_delay` plus jitter.
    pub fn backoff(&self) -> Duration {
        let jitter_ms = self.retry_jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.retry_delay;
        }
        let extra = rand::rng().random_range(0..=jitter_ms);
        self.retry_delay + Duration::from_millis(extra)
    }
}

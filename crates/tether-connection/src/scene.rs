//! Scene readiness: don't start a session until its scene is loaded.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SceneError;

/// The engine's scene loader.
pub trait SceneLoader: Send + Sync + 'static {
    /// Requests `name` to load. Returns immediately; loading continues in
    /// the background.
    fn load_scene(&self, name: &str);

    /// Whether `name` is fully loaded and active.
    fn is_scene_loaded(&self, name: &str) -> bool;
}

/// How [`SceneSynchronizer::ensure_loaded`] polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Time between `is_scene_loaded` checks.
    pub poll_interval: Duration,
    /// Give up after this long.
    pub deadline: Duration,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            deadline: Duration::from_secs(10),
        }
    }
}

impl SceneConfig {
    const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

    /// Raises a zero poll interval (which would spin) and keeps the
    /// deadline at least one poll long.
    pub fn validated(mut self) -> Self {
        self.poll_interval = self.poll_interval.max(Self::MIN_POLL_INTERVAL);
        self.deadline = self.deadline.max(self.poll_interval);
        self
    }
}

/// Waits for a scene to finish loading before network work proceeds.
#[derive(Clone)]
pub struct SceneSynchronizer {
    loader: Arc<dyn SceneLoader>,
    config: SceneConfig,
}

impl SceneSynchronizer {
    pub fn new(loader: Arc<dyn SceneLoader>, config: SceneConfig) -> Self {
        Self {
            loader,
            config: config.validated(),
        }
    }

    /// Makes sure `scene` is loaded, requesting the load if it isn't.
    ///
    /// # Errors
    /// [`SceneError::Timeout`] if the scene isn't loaded by the deadline.
    pub async fn ensure_loaded(&self, scene: &str) -> Result<(), SceneError> {
        if self.loader.is_scene_loaded(scene) {
            return Ok(());
        }

        tracing::debug!(scene, "requesting scene load");
        self.loader.load_scene(scene);

        let poll = async {
            let mut interval = tokio::time::interval(self.config.poll_interval);
            loop {
                interval.tick().await;
                if self.loader.is_scene_loaded(scene) {
                    return;
                }
            }
        };

        match tokio::time::timeout(self.config.deadline, poll).await {
            Ok(()) => {
                tracing::debug!(scene, "scene loaded");
                Ok(())
            }
            Err(_) => {
                tracing::warn!(scene, deadline = ?self.config.deadline, "scene load timed out");
                Err(SceneError::Timeout {
                    scene: scene.to_string(),
                    waited: self.config.deadline,
                })
            }
        }
    }
}

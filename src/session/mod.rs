//! Game session service
//!
//! Owns the transition from the bootstrap (menu) scene to gameplay. The
//! session is a lazy singleton: it resolves the scene cache and the core
//! configuration from the registry it is constructed in.

use crate::config::CoreConfig;
use crate::lifecycle::{self, LifecycleError, Service};
use crate::scene::{self, ContentRef, SceneBackend, SceneCache};
use crate::singleton::{Singleton, SingletonRegistry};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Session<B: SceneBackend<Key = ContentRef> + Default> {
    registry: SingletonRegistry,
    scenes: Arc<SceneCache<B>>,
    config: Arc<CoreConfig>,
    episodes: AtomicU64,
}

impl<B: SceneBackend<Key = ContentRef> + Default> Session<B> {
    /// Load gameplay content, make it active and drop the bootstrap scene
    ///
    /// The bootstrap unload runs in the background; if it fails the error
    /// is only logged.
    pub async fn start_new_episode(&self) -> scene::Result<B::Scene> {
        let gameplay = &self.config.gameplay_scene;
        tracing::info!(scene = %gameplay, "Starting new episode");

        let scene = self.scenes.load(gameplay, true).await?;
        let episode = self.episodes.fetch_add(1, Ordering::SeqCst) + 1;

        let scenes = Arc::clone(&self.scenes);
        let bootstrap = self.config.bootstrap_scene.clone();
        tokio::spawn(async move {
            if let Err(e) = scenes.unload(&bootstrap).await {
                tracing::warn!(scene = %bootstrap, "Failed to unload bootstrap scene: {}", e);
            }
        });

        tracing::info!(episode, "Episode started");
        Ok(scene)
    }

    /// Number of episodes started so far
    pub fn episode(&self) -> u64 {
        self.episodes.load(Ordering::SeqCst)
    }

    pub fn scenes(&self) -> &Arc<SceneCache<B>> {
        &self.scenes
    }
}

#[async_trait]
impl<B: SceneBackend<Key = ContentRef> + Default> Singleton for Session<B> {
    fn construct(registry: &SingletonRegistry) -> anyhow::Result<Self> {
        Ok(Self {
            registry: registry.clone(),
            scenes: registry.instance::<SceneCache<B>>()?,
            config: registry.instance::<CoreConfig>()?,
            episodes: AtomicU64::new(0),
        })
    }

    async fn release(&self) -> anyhow::Result<()> {
        tracing::info!(episodes = self.episode(), "Session released");
        Ok(())
    }
}

#[async_trait]
impl<B: SceneBackend<Key = ContentRef> + Default> Service for Session<B> {
    fn name(&self) -> &str {
        "Session"
    }

    async fn initialize(&self) -> lifecycle::Result<()> {
        tracing::info!("Session ready");
        Ok(())
    }

    async fn shutdown(&self) -> lifecycle::Result<()> {
        if !self.registry.unregister_instance(self) {
            tracing::debug!("Session was no longer registered");
        }
        self.release()
            .await
            .map_err(|e| LifecycleError::shutdown_failed(e.to_string()))
    }
}

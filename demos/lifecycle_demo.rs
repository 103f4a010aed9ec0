//! Boots the lifecycle with an in-memory scene backend, starts an episode
//! and shuts down on Ctrl+C (or after a few seconds).
//!
//! ```text
//! RUST_LOG=forgecore=debug FORGE_SETTLE_DELAY_MS=500 cargo run --example lifecycle_demo
//! ```

use forgecore::prelude::*;
use forgecore::scene::MemorySceneBackend;
use forgecore::session::Session;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type Backend = MemorySceneBackend;

struct FadeIn;

#[async_trait]
impl LifecycleObserver for FadeIn {
    async fn on_ready(&self) -> anyhow::Result<()> {
        tracing::info!("🎬 Fading in main menu");
        Ok(())
    }

    async fn on_shutting_down(&self) -> anyhow::Result<()> {
        tracing::info!("🌒 Fading out");
        Ok(())
    }
}

struct AudioService;

#[async_trait]
impl Service for AudioService {
    fn name(&self) -> &str {
        "AudioService"
    }

    async fn initialize(&self) -> forgecore::lifecycle::Result<()> {
        tracing::info!("Opening audio device");
        Ok(())
    }

    async fn shutdown(&self) -> forgecore::lifecycle::Result<()> {
        tracing::info!("Closing audio device");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("🚀 Starting lifecycle demo...");

    let registry = SingletonRegistry::new();
    let config = registry.instance::<CoreConfig>()?;
    tracing::info!(?config, "Loaded configuration");

    let backend = MemorySceneBackend::new().with_latency(Duration::from_millis(150));
    let stop = StopSignal::new();

    let orchestrator = Arc::new(
        Orchestrator::<Backend>::builder(registry.clone())
            .scenes(Arc::new(SceneCache::new(Arc::new(backend))))
            .with_service(Arc::new(AudioService))
            .service::<Session<Backend>>()
            .observer(Arc::new(FadeIn))
            .host(Arc::new(stop.clone()))
            .build()?,
    );

    orchestrator.start().await?;

    let session = registry.instance::<Session<Backend>>()?;
    let scene = session.start_new_episode().await?;
    tracing::info!(?scene, episode = session.episode(), "✅ Gameplay running");

    tokio::select! {
        _ = shutdown_signal() => {}
        _ = tokio::time::sleep(Duration::from_secs(3)) => {
            tracing::info!("Demo time is up");
        }
    }

    let report = orchestrator.shutdown().await?;
    tracing::info!(stopped = ?report.stopped, "Services stopped");

    let reason = stop.stopped().await;
    tracing::info!(?reason, "👋 Host stopped");
    Ok(())
}

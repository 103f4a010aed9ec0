use async_trait::async_trait;

/// Reacts to readiness and shutdown, e.g. a UI fading in its first frame
///
/// Each notification runs on its own task. A failing or panicking observer
/// is logged and affects neither its siblings nor the orchestrator.
#[async_trait]
pub trait LifecycleObserver: Send + Sync + 'static {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn on_ready(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn on_shutting_down(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Notification {
    Ready,
    ShuttingDown,
}

use super::Result;
use async_trait::async_trait;

/// A long-lived subsystem brought up and torn down by the orchestrator
///
/// Services are initialized one at a time in declaration order and shut
/// down one at a time in reverse order.
///
/// # Example
///
/// ```rust,ignore
/// use forgecore::lifecycle::{Result, Service};
/// use async_trait::async_trait;
///
/// pub struct AudioService;
///
/// #[async_trait]
/// impl Service for AudioService {
///     async fn initialize(&self) -> Result<()> {
///         tracing::info!("Opening audio device");
///         Ok(())
///     }
///
///     async fn shutdown(&self) -> Result<()> {
///         tracing::info!("Closing audio device");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Service: Send + Sync + 'static {
    /// Name used in logs and reports
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn initialize(&self) -> Result<()>;

    async fn shutdown(&self) -> Result<()>;
}

//! Graceful Shutdown Handler
//!
//! Handles OS signals and drives the orchestrator's shutdown.

use super::Orchestrator;
use crate::scene::{ContentRef, SceneBackend};
use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;

/// Handles graceful shutdown of the application
///
/// ShutdownHandler listens for OS signals (SIGTERM, SIGINT) and runs the
/// orchestrator's reverse-order shutdown when one arrives.
///
/// # Example
///
/// ```rust,ignore
/// use forgecore::lifecycle::ShutdownHandler;
/// use std::sync::Arc;
///
/// let orchestrator = Arc::new(orchestrator);
/// orchestrator.start().await?;
///
/// // The host control is invoked once shutdown completes
/// ShutdownHandler::new(Arc::clone(&orchestrator)).spawn();
/// ```
pub struct ShutdownHandler<B: SceneBackend<Key = ContentRef> + Default> {
    orchestrator: Arc<Orchestrator<B>>,
}

impl<B: SceneBackend<Key = ContentRef> + Default> ShutdownHandler<B> {
    /// Create a new ShutdownHandler
    pub fn new(orchestrator: Arc<Orchestrator<B>>) -> Self {
        Self { orchestrator }
    }

    /// Wait for a shutdown signal and perform graceful shutdown
    pub async fn wait_for_shutdown(&self) {
        shutdown_signal().await;
        self.shutdown().await;
    }

    /// Spawn a background task that waits for the signal
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.wait_for_shutdown().await })
    }

    /// Perform graceful shutdown
    async fn shutdown(&self) {
        tracing::info!("Starting graceful shutdown...");

        match self.orchestrator.shutdown().await {
            Ok(report) if report.is_clean() => {
                tracing::info!("Graceful shutdown complete");
            }
            Ok(report) => {
                for (service, e) in &report.failures {
                    tracing::warn!("{} did not shut down cleanly: {}", service, e);
                }
                tracing::warn!(
                    "Graceful shutdown complete with {} failures",
                    report.failures.len()
                );
            }
            Err(e) => tracing::error!("Error during shutdown: {}", e),
        }
    }
}

/// Create a future that completes when a shutdown signal is received
///
/// If a signal handler cannot be installed the error is logged and that
/// signal is never reported.
///
/// # Example
///
/// ```rust,ignore
/// use forgecore::lifecycle::shutdown_signal;
///
/// tokio::select! {
///     _ = shutdown_signal() => {
///         println!("Shutdown signal received");
///     }
///     _ = game_loop.run() => {}
/// }
/// ```
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }
}

//! Lifecycle Module
//!
//! Ordered startup and reverse-order shutdown of the application's services.
//!
//! # Lifecycle Phases
//!
//! ```text
//! 1. Bootstrap scene load + activation      (fatal on failure)
//!    ↓
//! 2. Service::initialize (each service, in declaration order)
//!    ↓
//! 3. Settle delay
//!    ↓
//! 4. Ready                                  ← LifecycleObserver::on_ready
//!    ↓
//! [Running...]
//!    ↓
//! 5. Shutdown request (call or SIGTERM/SIGINT)
//!    ↓
//! 6. ShuttingDown                           ← LifecycleObserver::on_shutting_down
//!    ↓
//! 7. Service::shutdown (each service, in reverse order)
//!    ↓
//! 8. Shutdown, host terminated
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use forgecore::lifecycle::{LifecycleError, Orchestrator, Service};
//! use async_trait::async_trait;
//!
//! pub struct NetworkService;
//!
//! #[async_trait]
//! impl Service for NetworkService {
//!     async fn initialize(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Opening sockets");
//!         Ok(())
//!     }
//!
//!     async fn shutdown(&self) -> Result<(), LifecycleError> {
//!         tracing::info!("Closing sockets");
//!         Ok(())
//!     }
//! }
//!
//! let orchestrator = Orchestrator::<MemorySceneBackend>::builder(registry)
//!     .with_service(Arc::new(NetworkService))
//!     .build()?;
//! orchestrator.start().await?;
//! ```

mod error;
mod host;
mod observer;
mod orchestrator;
mod service;
mod shutdown;
mod state;

pub use error::{LifecycleError, Result};
pub use host::{host_for, HostControl, ProcessExit, StopSignal, TerminationReason};
pub use observer::LifecycleObserver;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, ShutdownReport};
pub use service::Service;
pub use shutdown::{shutdown_signal, ShutdownHandler};
pub use state::{LifecycleEvent, LifecycleState};

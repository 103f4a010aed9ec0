//! # Forgecore
//!
//! The lifecycle core of an interactive application: a registry of
//! long-lived services reachable through singleton access, a deduplicating
//! scene cache, and an orchestrator that brings everything up in order and
//! tears it down in reverse.
//!
//! ## Features
//!
//! - **Singleton Registry**: at most one live instance per type, with eager,
//!   locked or lazy access policies chosen per type
//! - **Two-step Teardown**: slots are cleared before instances release their
//!   resources, so racing accesses never see a departing instance
//! - **Scene Cache**: one backend load per content reference, however many
//!   callers ask for it
//! - **Ordered Lifecycle**: sequential startup, settle delay, readiness
//!   notification and reverse-order async shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forgecore::prelude::*;
//! use forgecore::scene::MemorySceneBackend;
//! use forgecore::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = SingletonRegistry::new();
//!
//!     let orchestrator = Arc::new(
//!         Orchestrator::<MemorySceneBackend>::builder(registry.clone())
//!             .service::<Session<MemorySceneBackend>>()
//!             .build()?,
//!     );
//!
//!     orchestrator.start().await?;
//!
//!     let session = registry.instance::<Session<MemorySceneBackend>>()?;
//!     session.start_new_episode().await?;
//!
//!     orchestrator.shutdown_handler().wait_for_shutdown().await;
//!     Ok(())
//! }
//! ```

// Lets `#[derive(Singleton)]` expand inside this crate too
extern crate self as forgecore;

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod scene;
pub mod session;
pub mod singleton;

// Re-export core types
pub use config::{ConfigService, CoreConfig, HostPolicy};
pub use error::{ForgeError, Result, SingletonError};
pub use lifecycle::{LifecycleError, LifecycleState, Orchestrator, Service};
pub use scene::{ContentRef, SceneBackend, SceneCache, SceneError};
pub use singleton::{AccessPolicy, Singleton, SingletonRegistry};

// Re-export macros
pub use forgecore_macro::Singleton;

// Re-export commonly used types from dependencies
pub use anyhow;
pub use async_trait::async_trait;

/// Prelude module for convenient imports
///
/// ```
/// use forgecore::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::{ConfigService, CoreConfig, HostPolicy};
    pub use crate::error::{ForgeError, Result, SingletonError};
    pub use crate::lifecycle::{
        HostControl, LifecycleError, LifecycleEvent, LifecycleObserver, LifecycleState,
        Orchestrator, OrchestratorBuilder, ProcessExit, Service, ShutdownHandler, ShutdownReport,
        StopSignal, TerminationReason, shutdown_signal,
    };
    pub use crate::scene::{ContentRef, SceneBackend, SceneCache, SceneError};
    pub use crate::singleton::{
        AccessPolicy, Adoption, ServiceHandle, SingletonAccess, SingletonRegistry,
    };
    // Trait and derive macro
    pub use crate::Singleton;
    pub use async_trait::async_trait;
    pub use std::sync::Arc;
}

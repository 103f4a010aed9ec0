//! The singleton contract
//!
//! A type becomes a singleton by implementing [`Singleton`], either by hand
//! or with `#[derive(Singleton)]` for `Default` types.

use super::{AccessPolicy, SingletonRegistry};
use crate::error::SingletonError;
use async_trait::async_trait;
use std::sync::Arc;

/// A long-lived type with at most one live instance per registry
///
/// # Example
///
/// ```rust,ignore
/// use forgecore::singleton::{AccessPolicy, Singleton, SingletonRegistry};
///
/// pub struct AudioService {
///     volume: f32,
/// }
///
/// impl Singleton for AudioService {
///     const POLICY: AccessPolicy = AccessPolicy::Locked;
///
///     fn construct(_registry: &SingletonRegistry) -> anyhow::Result<Self> {
///         Ok(Self { volume: 1.0 })
///     }
/// }
///
/// let registry = SingletonRegistry::new();
/// let audio = registry.instance::<AudioService>()?;
/// ```
#[async_trait]
pub trait Singleton: Send + Sync + Sized + 'static {
    /// Policy used when the type is first seen by a registry
    const POLICY: AccessPolicy = AccessPolicy::Lazy;

    /// Build the instance on demand
    ///
    /// Other singletons may be resolved from `registry`. Asking for `Self`
    /// from here fails with [`SingletonError::Reentrant`].
    fn construct(registry: &SingletonRegistry) -> anyhow::Result<Self>;

    /// Release resources once the instance has left its slot
    ///
    /// Runs after the slot was cleared, never before.
    async fn release(&self) -> anyhow::Result<()> {
        Ok(())
    }

    /// The instance held by the process-wide registry
    fn instance() -> Result<Arc<Self>, SingletonError> {
        SingletonRegistry::global().instance::<Self>()
    }
}

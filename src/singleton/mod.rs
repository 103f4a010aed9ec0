//! Singleton Registry Module
//!
//! A per-type registry of long-lived instances. Each type has exactly one
//! slot, and each slot holds at most one live instance at any time.
//!
//! # Access Policies
//!
//! ```text
//! Eager   load ─▶ hit? ─▶ return
//!                  └─▶ construct ─▶ CAS publish (loser discarded)
//!
//! Locked  lock ─▶ hit? ─▶ return
//!                  └─▶ construct ─▶ store ─▶ unlock
//!
//! Lazy    load ─▶ hit? ─▶ return            (wait-free steady state)
//!                  └─▶ one-shot init (runs at most once)
//! ```
//!
//! # Teardown
//!
//! Destruction happens in two steps: the slot is cleared synchronously
//! ([`SingletonRegistry::unregister`]), then the instance releases its
//! resources ([`Singleton::release`]). An access that races with the
//! release never sees the departing instance.
//!
//! # Example
//!
//! ```rust,ignore
//! use forgecore::singleton::SingletonRegistry;
//! use forgecore::Singleton;
//!
//! #[derive(Default, Singleton)]
//! pub struct InputService;
//!
//! let registry = SingletonRegistry::new();
//! let input = registry.instance::<InputService>()?;
//! registry.destroy(input).await?;
//! ```

mod access;
mod handle;
mod policy;
mod registry;
mod slot;
mod traits;

pub use access::SingletonAccess;
pub use handle::{ServiceHandle, SlotState};
pub use policy::AccessPolicy;
pub use registry::SingletonRegistry;
pub use slot::Adoption;
pub use traits::Singleton;

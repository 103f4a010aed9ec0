use super::slot::Slot;
use super::{AccessPolicy, Singleton, SingletonRegistry};
use crate::error::SingletonError;
use std::sync::Arc;

/// Direct handle on the slot of one singleton type
///
/// Obtained from [`SingletonRegistry::access`]. Holding one avoids the
/// registry's type lookup, so with the lazy policy a steady-state
/// [`instance`](Self::instance) call is a single wait-free load.
pub struct SingletonAccess<T: Singleton> {
    slot: Arc<Slot<T>>,
    registry: SingletonRegistry,
}

impl<T: Singleton> SingletonAccess<T> {
    pub(crate) fn new(slot: Arc<Slot<T>>, registry: SingletonRegistry) -> Self {
        Self { slot, registry }
    }

    /// The live instance, constructed on demand
    #[inline]
    pub fn instance(&self) -> Result<Arc<T>, SingletonError> {
        self.slot.instance(&self.registry)
    }

    /// The live instance, if any, without constructing one
    pub fn get(&self) -> Option<Arc<T>> {
        self.slot.current().map(|entry| Arc::clone(&entry.instance))
    }

    pub fn policy(&self) -> AccessPolicy {
        self.slot.policy()
    }

    pub fn registry(&self) -> &SingletonRegistry {
        &self.registry
    }
}

impl<T: Singleton> Clone for SingletonAccess<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            registry: self.registry.clone(),
        }
    }
}

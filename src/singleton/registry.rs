use super::slot::{Adoption, ErasedSlot, Slot};
use super::{AccessPolicy, ServiceHandle, Singleton, SingletonAccess};
use crate::error::SingletonError;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::any::TypeId;
use std::sync::Arc;

static GLOBAL: Lazy<SingletonRegistry> = Lazy::new(SingletonRegistry::new);

/// Thread-safe registry of singleton slots, keyed by type
///
/// Cloning is cheap and every clone shares the same slots. The process-wide
/// instance is [`SingletonRegistry::global`]; tests and embedders usually
/// create their own so state does not leak between them.
#[derive(Clone, Default)]
pub struct SingletonRegistry {
    slots: Arc<DashMap<TypeId, Arc<dyn ErasedSlot>>>,
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
        }
    }

    /// The process-wide registry
    pub fn global() -> &'static SingletonRegistry {
        &GLOBAL
    }

    fn slot<T: Singleton>(&self, policy: AccessPolicy) -> Result<Arc<Slot<T>>, SingletonError> {
        let type_id = TypeId::of::<T>();
        // The read guard must be gone before `entry` takes the shard lock.
        let existing = self.slots.get(&type_id).map(|slot| Arc::clone(slot.value()));
        let erased = match existing {
            Some(slot) => slot,
            None => {
                let slot = self.slots.entry(type_id).or_insert_with(|| {
                    tracing::trace!(
                        singleton = std::any::type_name::<T>(),
                        %policy,
                        "Registered singleton slot"
                    );
                    Arc::new(Slot::<T>::new(policy)) as Arc<dyn ErasedSlot>
                });
                Arc::clone(slot.value())
            }
        };

        erased
            .into_any()
            .downcast::<Slot<T>>()
            .map_err(|_| SingletonError::downcast_failed::<T>())
    }

    /// Register `T` with an explicit policy instead of `T::POLICY`
    ///
    /// Registering again with the same policy is a no-op. Once a slot exists
    /// its policy is fixed, so a different policy is an error.
    pub fn register_policy<T: Singleton>(
        &self,
        policy: AccessPolicy,
    ) -> Result<SingletonAccess<T>, SingletonError> {
        let slot = self.slot::<T>(policy)?;
        if slot.policy() != policy {
            return Err(SingletonError::PolicyMismatch {
                type_name: std::any::type_name::<T>(),
                registered: slot.policy().to_string(),
                requested: policy.to_string(),
            });
        }
        Ok(SingletonAccess::new(slot, self.clone()))
    }

    /// Access object for `T`; hold on to it to skip the type lookup
    pub fn access<T: Singleton>(&self) -> Result<SingletonAccess<T>, SingletonError> {
        let slot = self.slot::<T>(T::POLICY)?;
        Ok(SingletonAccess::new(slot, self.clone()))
    }

    /// The live instance of `T`, constructed on demand
    pub fn instance<T: Singleton>(&self) -> Result<Arc<T>, SingletonError> {
        self.slot::<T>(T::POLICY)?.instance(self)
    }

    /// The live instance of `T`, if any, without constructing one
    pub fn get<T: Singleton>(&self) -> Option<Arc<T>> {
        let type_id = TypeId::of::<T>();
        let erased = self.slots.get(&type_id).map(|slot| Arc::clone(slot.value()))?;
        let slot = erased.into_any().downcast::<Slot<T>>().ok()?;
        slot.current().map(|entry| Arc::clone(&entry.instance))
    }

    /// Whether a live instance of `T` exists
    pub fn contains<T: Singleton>(&self) -> bool {
        self.get::<T>().is_some()
    }

    /// Hand an instance built by its owner to the registry
    ///
    /// The instance becomes the singleton if the slot is vacant. If another
    /// instance is already live the offered one is discarded.
    pub fn adopt<T: Singleton>(&self, instance: Arc<T>) -> Result<Adoption<T>, SingletonError> {
        Ok(self.slot::<T>(T::POLICY)?.adopt(instance))
    }

    /// Clear the slot of `T` if it still holds `instance`
    ///
    /// This is the synchronous first half of teardown. It returns `false`
    /// when the slot already moved on (vacant, or holding a newer instance).
    pub fn unregister<T: Singleton>(&self, instance: &Arc<T>) -> bool {
        self.unregister_instance(instance.as_ref())
    }

    /// Same as [`unregister`](Self::unregister), for code that only has `&T`
    pub fn unregister_instance<T: Singleton>(&self, instance: &T) -> bool {
        let type_id = TypeId::of::<T>();
        let Some(erased) = self.slots.get(&type_id).map(|slot| Arc::clone(slot.value())) else {
            return false;
        };
        let Ok(slot) = erased.into_any().downcast::<Slot<T>>() else {
            return false;
        };

        let cleared = slot.unregister(instance as *const T);
        if cleared {
            tracing::debug!(
                singleton = std::any::type_name::<T>(),
                "Unregistered singleton"
            );
        }
        cleared
    }

    /// Two-step teardown: clear the slot, then release the instance
    ///
    /// The slot is cleared before `release` starts, so any access racing
    /// with the release already sees a vacant slot and builds a new instance.
    pub async fn destroy<T: Singleton>(&self, instance: Arc<T>) -> Result<bool, SingletonError> {
        let cleared = self.unregister(&instance);

        instance.release().await.map_err(|source| {
            tracing::warn!(
                singleton = std::any::type_name::<T>(),
                "Singleton release failed: {:#}",
                source
            );
            SingletonError::Release {
                type_name: std::any::type_name::<T>(),
                source,
            }
        })?;

        Ok(cleared)
    }

    /// Snapshot of the slot for `T`
    pub fn handle<T: Singleton>(&self) -> Option<ServiceHandle> {
        self.slots
            .get(&TypeId::of::<T>())
            .map(|slot| slot.value().handle())
    }

    /// Snapshots of every slot
    pub fn handles(&self) -> Vec<ServiceHandle> {
        self.slots.iter().map(|slot| slot.value().handle()).collect()
    }

    /// Empty every slot, returning how many held an instance
    ///
    /// Policies stay registered. Used between sessions (and tests) to start
    /// again from a clean registry.
    pub fn reset(&self) -> usize {
        let slots: Vec<_> = self.slots.iter().map(|slot| Arc::clone(slot.value())).collect();
        let cleared = slots.iter().filter(|slot| slot.clear_erased()).count();
        tracing::debug!(cleared, "Reset singleton registry");
        cleared
    }

    /// Number of registered slots, live or not
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl std::fmt::Debug for SingletonRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingletonRegistry")
            .field("slots", &self.slots.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SingletonError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    macro_rules! counted_singleton {
        ($name:ident, $counter:ident, $policy:expr) => {
            static $counter: AtomicUsize = AtomicUsize::new(0);

            struct $name {
                serial: usize,
            }

            impl Singleton for $name {
                const POLICY: AccessPolicy = $policy;

                fn construct(_registry: &SingletonRegistry) -> anyhow::Result<Self> {
                    let serial = $counter.fetch_add(1, Ordering::SeqCst) + 1;
                    // Widen the race window for concurrent first access
                    std::thread::sleep(std::time::Duration::from_millis(5));
                    Ok(Self { serial })
                }
            }
        };
    }

    fn hammer<T: Singleton>(registry: &SingletonRegistry, threads: usize) -> Vec<Arc<T>> {
        let barrier = Barrier::new(threads);
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        registry.instance::<T>().unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
    }

    #[test]
    fn test_lazy_concurrent_first_access_constructs_once() {
        counted_singleton!(LazyService, LAZY_BUILDS, AccessPolicy::Lazy);

        let registry = SingletonRegistry::new();
        let instances = hammer::<LazyService>(&registry, 16);

        assert_eq!(LAZY_BUILDS.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        assert_eq!(instances[0].serial, 1);
    }

    #[test]
    fn test_locked_concurrent_first_access_constructs_once() {
        counted_singleton!(LockedService, LOCKED_BUILDS, AccessPolicy::Locked);

        let registry = SingletonRegistry::new();
        let instances = hammer::<LockedService>(&registry, 16);

        assert_eq!(LOCKED_BUILDS.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }

    #[test]
    fn test_eager_race_publishes_single_winner() {
        counted_singleton!(EagerService, EAGER_BUILDS, AccessPolicy::Eager);

        let registry = SingletonRegistry::new();
        let instances = hammer::<EagerService>(&registry, 8);

        // Constructions may duplicate, but every caller gets the published one
        assert!(EAGER_BUILDS.load(Ordering::SeqCst) >= 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
        let live = registry.get::<EagerService>().unwrap();
        assert!(Arc::ptr_eq(&live, &instances[0]));
    }

    #[test]
    fn test_steady_state_returns_same_instance() {
        counted_singleton!(SteadyService, STEADY_BUILDS, AccessPolicy::Lazy);

        let registry = SingletonRegistry::new();
        let access = registry.access::<SteadyService>().unwrap();
        let first = access.instance().unwrap();
        for _ in 0..100 {
            assert!(Arc::ptr_eq(&first, &access.instance().unwrap()));
        }
        assert_eq!(STEADY_BUILDS.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_destroy_clears_slot_before_next_access() {
        counted_singleton!(DestroyedService, DESTROYED_BUILDS, AccessPolicy::Lazy);

        let registry = SingletonRegistry::new();
        let first = registry.instance::<DestroyedService>().unwrap();
        assert_eq!(registry.handle::<DestroyedService>().unwrap().generation, 1);

        let cleared = registry.destroy(Arc::clone(&first)).await.unwrap();
        assert!(cleared);
        assert!(!registry.contains::<DestroyedService>());

        let second = registry.instance::<DestroyedService>().unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.serial, 2);
        assert_eq!(DESTROYED_BUILDS.load(Ordering::SeqCst), 2);
        assert_eq!(registry.handle::<DestroyedService>().unwrap().generation, 2);
    }

    #[test]
    fn test_unregister_stale_instance_keeps_new_one() {
        counted_singleton!(StaleService, STALE_BUILDS, AccessPolicy::Locked);

        let registry = SingletonRegistry::new();
        let first = registry.instance::<StaleService>().unwrap();
        assert!(registry.unregister(&first));
        let second = registry.instance::<StaleService>().unwrap();

        assert!(!registry.unregister(&first));
        assert!(registry.contains::<StaleService>());
        assert!(Arc::ptr_eq(&registry.get::<StaleService>().unwrap(), &second));
        assert_eq!(STALE_BUILDS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_construction_is_not_cached() {
        static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

        struct Flaky;

        impl Singleton for Flaky {
            fn construct(_registry: &SingletonRegistry) -> anyhow::Result<Self> {
                if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("device not ready");
                }
                Ok(Flaky)
            }
        }

        let registry = SingletonRegistry::new();
        let err = registry.instance::<Flaky>().err().unwrap();
        assert!(matches!(err, SingletonError::Construction { .. }));
        assert!(!registry.contains::<Flaky>());

        assert!(registry.instance::<Flaky>().is_ok());
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_reentrant_construction_is_reported() {
        struct SelfReferential;

        impl Singleton for SelfReferential {
            fn construct(registry: &SingletonRegistry) -> anyhow::Result<Self> {
                registry.instance::<SelfReferential>()?;
                Ok(SelfReferential)
            }
        }

        struct SelfReferentialLocked;

        impl Singleton for SelfReferentialLocked {
            const POLICY: AccessPolicy = AccessPolicy::Locked;

            fn construct(registry: &SingletonRegistry) -> anyhow::Result<Self> {
                registry.instance::<SelfReferentialLocked>()?;
                Ok(SelfReferentialLocked)
            }
        }

        let registry = SingletonRegistry::new();
        assert!(matches!(
            registry.instance::<SelfReferential>(),
            Err(SingletonError::Construction { .. })
        ));
        assert!(matches!(
            registry.instance::<SelfReferentialLocked>(),
            Err(SingletonError::Construction { .. })
        ));
        assert!(!registry.contains::<SelfReferential>());
    }

    #[test]
    fn test_adopt_registers_then_rejects_duplicates() {
        struct Manager(u32);

        impl Singleton for Manager {
            fn construct(_registry: &SingletonRegistry) -> anyhow::Result<Self> {
                Ok(Manager(0))
            }
        }

        let registry = SingletonRegistry::new();
        let owned = Arc::new(Manager(7));

        let adoption = registry.adopt(Arc::clone(&owned)).unwrap();
        assert!(adoption.is_registered());
        assert!(matches!(
            registry.adopt(Arc::clone(&owned)).unwrap(),
            Adoption::AlreadyLive(_)
        ));

        let duplicate = registry.adopt(Arc::new(Manager(8))).unwrap();
        assert!(duplicate.is_rejected());
        assert_eq!(duplicate.instance().0, 7);
        assert_eq!(registry.instance::<Manager>().unwrap().0, 7);
    }

    #[test]
    fn test_register_policy_is_fixed_once_chosen() {
        counted_singleton!(PolicyService, POLICY_BUILDS, AccessPolicy::Lazy);

        let registry = SingletonRegistry::new();
        let access = registry
            .register_policy::<PolicyService>(AccessPolicy::Locked)
            .unwrap();
        assert_eq!(access.policy(), AccessPolicy::Locked);
        assert!(registry
            .register_policy::<PolicyService>(AccessPolicy::Locked)
            .is_ok());
        assert!(matches!(
            registry.register_policy::<PolicyService>(AccessPolicy::Eager),
            Err(SingletonError::PolicyMismatch { .. })
        ));

        registry.instance::<PolicyService>().unwrap();
        assert_eq!(
            registry.handle::<PolicyService>().unwrap().policy,
            AccessPolicy::Locked
        );
        assert_eq!(POLICY_BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reset_clears_every_slot() {
        counted_singleton!(FirstService, FIRST_BUILDS, AccessPolicy::Eager);
        counted_singleton!(SecondService, SECOND_BUILDS, AccessPolicy::Lazy);

        let registry = SingletonRegistry::new();
        registry.instance::<FirstService>().unwrap();
        registry.instance::<SecondService>().unwrap();
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.reset(), 2);
        assert!(registry.handles().iter().all(|h| !h.is_live()));
        assert_eq!(registry.len(), 2);

        registry.instance::<SecondService>().unwrap();
        assert_eq!(SECOND_BUILDS.load(Ordering::SeqCst), 2);
        assert_eq!(FIRST_BUILDS.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_derived_singleton_uses_declared_policy() {
        #[derive(Default, crate::Singleton)]
        #[singleton(policy = "eager")]
        struct Telemetry {
            frames: u64,
        }

        let registry = SingletonRegistry::new();
        let telemetry = registry.instance::<Telemetry>().unwrap();
        assert_eq!(telemetry.frames, 0);
        assert_eq!(
            registry.handle::<Telemetry>().unwrap().policy,
            AccessPolicy::Eager
        );
    }
}

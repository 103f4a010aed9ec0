//! Per-type singleton slots
//!
//! One [`Slot`] exists per registered type. Its cell is chosen by the
//! [`AccessPolicy`] and never changes afterwards.

use super::handle::{ServiceHandle, SlotEntry, SlotState};
use super::{AccessPolicy, Singleton, SingletonRegistry};
use crate::error::SingletonError;
use arc_swap::{ArcSwap, ArcSwapOption};
use once_cell::sync::OnceCell;
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

thread_local! {
    static CONSTRUCTING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Marks a type as under construction on the current thread
struct ConstructionGuard {
    type_id: TypeId,
}

impl ConstructionGuard {
    fn enter<T: 'static>() -> Result<Self, SingletonError> {
        let type_id = TypeId::of::<T>();
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&type_id) {
                return Err(SingletonError::reentrant::<T>());
            }
            stack.push(type_id);
            Ok(Self { type_id })
        })
    }

    fn is_constructing<T: 'static>() -> bool {
        let type_id = TypeId::of::<T>();
        CONSTRUCTING.with(|stack| stack.borrow().contains(&type_id))
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|id| *id == self.type_id) {
                stack.remove(pos);
            }
        });
    }
}

/// Outcome of handing an externally built instance to a registry
#[derive(Debug)]
pub enum Adoption<T> {
    /// The slot was vacant and now holds this instance
    Registered(Arc<T>),
    /// This very instance was already live
    AlreadyLive(Arc<T>),
    /// Another instance is live; the offered one was discarded
    Rejected { existing: Arc<T> },
}

impl<T> Adoption<T> {
    /// The instance that is live after adoption
    pub fn instance(&self) -> &Arc<T> {
        match self {
            Self::Registered(instance) | Self::AlreadyLive(instance) => instance,
            Self::Rejected { existing } => existing,
        }
    }

    pub fn into_instance(self) -> Arc<T> {
        match self {
            Self::Registered(instance) | Self::AlreadyLive(instance) => instance,
            Self::Rejected { existing } => existing,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, Self::Registered(_))
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

enum SlotCell<T> {
    Eager(ArcSwapOption<SlotEntry<T>>),
    Locked(Mutex<Option<Arc<SlotEntry<T>>>>),
    Lazy(ArcSwap<OnceCell<Arc<SlotEntry<T>>>>),
}

pub(crate) struct Slot<T> {
    policy: AccessPolicy,
    cell: SlotCell<T>,
    generations: AtomicU64,
}

impl<T: Singleton> Slot<T> {
    pub(crate) fn new(policy: AccessPolicy) -> Self {
        let cell = match policy {
            AccessPolicy::Eager => SlotCell::Eager(ArcSwapOption::empty()),
            AccessPolicy::Locked => SlotCell::Locked(Mutex::new(None)),
            AccessPolicy::Lazy => SlotCell::Lazy(ArcSwap::from_pointee(OnceCell::new())),
        };
        Self {
            policy,
            cell,
            generations: AtomicU64::new(0),
        }
    }

    pub(crate) fn policy(&self) -> AccessPolicy {
        self.policy
    }

    fn entry(&self, instance: Arc<T>) -> Arc<SlotEntry<T>> {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        Arc::new(SlotEntry::new(instance, generation))
    }

    fn build(&self, registry: &SingletonRegistry) -> Result<Arc<SlotEntry<T>>, SingletonError> {
        let _guard = ConstructionGuard::enter::<T>()?;
        let instance = T::construct(registry).map_err(|e| {
            tracing::error!(
                singleton = std::any::type_name::<T>(),
                "Singleton construction failed: {:#}",
                e
            );
            SingletonError::construction::<T>(e)
        })?;
        let entry = self.entry(Arc::new(instance));
        tracing::debug!(
            singleton = std::any::type_name::<T>(),
            policy = %self.policy,
            generation = entry.generation,
            "Constructed singleton"
        );
        Ok(entry)
    }

    /// Return the live instance, constructing it if the slot is vacant
    pub(crate) fn instance(&self, registry: &SingletonRegistry) -> Result<Arc<T>, SingletonError> {
        match &self.cell {
            SlotCell::Eager(cell) => {
                if let Some(entry) = cell.load_full() {
                    return Ok(Arc::clone(&entry.instance));
                }

                let fresh = self.build(registry)?;
                let previous = cell.compare_and_swap(&None::<Arc<SlotEntry<T>>>, Some(Arc::clone(&fresh)));
                match &*previous {
                    None => Ok(Arc::clone(&fresh.instance)),
                    Some(winner) => {
                        tracing::debug!(
                            singleton = std::any::type_name::<T>(),
                            "Discarding duplicate eager construction"
                        );
                        Ok(Arc::clone(&winner.instance))
                    }
                }
            }
            SlotCell::Locked(cell) => {
                if ConstructionGuard::is_constructing::<T>() {
                    return Err(SingletonError::reentrant::<T>());
                }

                let mut guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(entry) = guard.as_ref() {
                    return Ok(Arc::clone(&entry.instance));
                }

                let fresh = self.build(registry)?;
                let instance = Arc::clone(&fresh.instance);
                *guard = Some(fresh);
                Ok(instance)
            }
            SlotCell::Lazy(cell) => {
                {
                    let current = cell.load();
                    if let Some(entry) = current.get() {
                        return Ok(Arc::clone(&entry.instance));
                    }
                }

                if ConstructionGuard::is_constructing::<T>() {
                    return Err(SingletonError::reentrant::<T>());
                }

                loop {
                    let current = cell.load_full();
                    let entry = Arc::clone(current.get_or_try_init(|| self.build(registry))?);

                    // A reset during construction swaps in a fresh cell; the
                    // instance built into the old one was never visible.
                    if Arc::ptr_eq(&*cell.load(), &current) {
                        return Ok(Arc::clone(&entry.instance));
                    }
                }
            }
        }
    }

    pub(crate) fn current(&self) -> Option<Arc<SlotEntry<T>>> {
        match &self.cell {
            SlotCell::Eager(cell) => cell.load_full(),
            SlotCell::Locked(cell) => cell.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            SlotCell::Lazy(cell) => cell.load().get().cloned(),
        }
    }

    /// Install an externally built instance if the slot is vacant
    pub(crate) fn adopt(&self, instance: Arc<T>) -> Adoption<T> {
        let outcome = match &self.cell {
            SlotCell::Eager(cell) => {
                let current = cell.load_full();
                match current {
                    Some(entry) if entry.holds(Arc::as_ptr(&instance)) => Adoption::AlreadyLive(instance),
                    Some(entry) => Adoption::Rejected {
                        existing: Arc::clone(&entry.instance),
                    },
                    None => {
                        let fresh = self.entry(Arc::clone(&instance));
                        let previous = cell.compare_and_swap(&None::<Arc<SlotEntry<T>>>, Some(fresh));
                        match &*previous {
                            None => Adoption::Registered(instance),
                            Some(winner) => Adoption::Rejected {
                                existing: Arc::clone(&winner.instance),
                            },
                        }
                    }
                }
            }
            SlotCell::Locked(cell) => {
                let mut guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
                let existing = guard.as_ref().map(|entry| Arc::clone(&entry.instance));
                match existing {
                    Some(existing) if Arc::ptr_eq(&existing, &instance) => Adoption::AlreadyLive(instance),
                    Some(existing) => Adoption::Rejected { existing },
                    None => {
                        *guard = Some(self.entry(Arc::clone(&instance)));
                        Adoption::Registered(instance)
                    }
                }
            }
            SlotCell::Lazy(cell) => loop {
                let current = cell.load_full();
                if let Some(entry) = current.get() {
                    if entry.holds(Arc::as_ptr(&instance)) {
                        break Adoption::AlreadyLive(instance);
                    }
                    break Adoption::Rejected {
                        existing: Arc::clone(&entry.instance),
                    };
                }

                if current.set(self.entry(Arc::clone(&instance))).is_ok()
                    && Arc::ptr_eq(&*cell.load(), &current)
                {
                    break Adoption::Registered(instance);
                }
            },
        };

        if outcome.is_rejected() {
            tracing::debug!(
                singleton = std::any::type_name::<T>(),
                "Rejected duplicate instance, another one is already live"
            );
        }
        outcome
    }

    /// Clear the slot if, and only if, it holds the instance at `ptr`
    pub(crate) fn unregister(&self, ptr: *const T) -> bool {
        match &self.cell {
            SlotCell::Eager(cell) => {
                let current = cell.load();
                match &*current {
                    Some(entry) if entry.holds(ptr) => {
                        let previous = cell.compare_and_swap(&current, None);
                        match (&*previous, &*current) {
                            (Some(prev), Some(cur)) => Arc::ptr_eq(prev, cur),
                            _ => false,
                        }
                    }
                    _ => false,
                }
            }
            SlotCell::Locked(cell) => {
                let mut guard = cell.lock().unwrap_or_else(PoisonError::into_inner);
                let holds = guard.as_ref().is_some_and(|entry| entry.holds(ptr));
                if holds {
                    *guard = None;
                }
                holds
            }
            SlotCell::Lazy(cell) => {
                let current = cell.load_full();
                match current.get() {
                    Some(entry) if entry.holds(ptr) => {
                        let previous = cell.compare_and_swap(&current, Arc::new(OnceCell::new()));
                        Arc::ptr_eq(&*previous, &current)
                    }
                    _ => false,
                }
            }
        }
    }

    /// Empty the slot whatever it holds
    pub(crate) fn clear(&self) -> Option<Arc<T>> {
        let previous = match &self.cell {
            SlotCell::Eager(cell) => cell.swap(None),
            SlotCell::Locked(cell) => cell.lock().unwrap_or_else(PoisonError::into_inner).take(),
            SlotCell::Lazy(cell) => cell.swap(Arc::new(OnceCell::new())).get().cloned(),
        };
        previous.map(|entry| Arc::clone(&entry.instance))
    }
}

/// Type-erased view of a slot, used for registry-wide operations
pub(crate) trait ErasedSlot: Send + Sync {
    fn handle(&self) -> ServiceHandle;

    fn clear_erased(&self) -> bool;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Singleton> ErasedSlot for Slot<T> {
    fn handle(&self) -> ServiceHandle {
        let current = self.current();
        ServiceHandle {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            policy: self.policy,
            state: if current.is_some() {
                SlotState::Live
            } else {
                SlotState::Vacant
            },
            instance_id: current.as_ref().map(|entry| entry.id),
            generation: current.as_ref().map_or(0, |entry| entry.generation),
        }
    }

    fn clear_erased(&self) -> bool {
        self.clear().is_some()
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

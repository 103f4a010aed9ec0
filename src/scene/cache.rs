//! Deduplicating cache of loaded scenes
//!
//! Every cached key owns a [`SceneSlot`] whose status is published on a
//! `watch` channel. The first caller for a key inserts the slot before it
//! suspends and drives the backend; later callers subscribe and wait.
//!
//! ```text
//! Loading ──ok──▶ Loaded ──claim──▶ Unloading ──ok──▶ Unloaded (evicted)
//!    │                ▲                  │
//!    └─err/cancel─▶ Failed (evicted)     └──err──▶ Loaded
//! ```

use super::{Result, SceneBackend, SceneError};
use crate::singleton::{Singleton, SingletonRegistry};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum SceneStatus<S> {
    Loading,
    Loaded(S),
    Unloading(S),
    Unloaded,
    Failed(SceneError),
}

struct SceneSlot<S> {
    status: watch::Sender<SceneStatus<S>>,
}

impl<S> SceneSlot<S> {
    fn loading() -> Self {
        let (status, _) = watch::channel(SceneStatus::Loading);
        Self { status }
    }
}

type SlotRef<B> = Arc<SceneSlot<<B as SceneBackend>::Scene>>;

/// Publishes `fallback` if the operation that armed it is dropped mid-flight
struct PendingGuard<'a, B: SceneBackend> {
    cache: &'a SceneCache<B>,
    key: &'a B::Key,
    slot: &'a SlotRef<B>,
    fallback: Option<SceneStatus<B::Scene>>,
    evict: bool,
}

impl<B: SceneBackend> PendingGuard<'_, B> {
    fn disarm(&mut self) {
        self.fallback = None;
    }
}

impl<B: SceneBackend> Drop for PendingGuard<'_, B> {
    fn drop(&mut self) {
        if let Some(status) = self.fallback.take() {
            tracing::warn!(scene = ?self.key, "Scene operation cancelled before completion");
            if self.evict {
                self.cache.evict(self.key, self.slot);
            }
            self.slot.status.send_replace(status);
        }
    }
}

/// Map from content reference to an in-flight or completed scene load
///
/// No backend load is ever issued twice for a key that is cached, and
/// concurrent unloads of one key issue a single backend unload.
///
/// # Example
///
/// ```rust,ignore
/// use forgecore::scene::{ContentRef, MemorySceneBackend, SceneCache};
///
/// let cache = SceneCache::new(Arc::new(MemorySceneBackend::new()));
/// let menu = ContentRef::from("SC_MainMenu");
///
/// let scene = cache.load(&menu, true).await?;
/// cache.unload(&menu).await?;
/// ```
pub struct SceneCache<B: SceneBackend> {
    backend: Arc<B>,
    entries: DashMap<B::Key, SlotRef<B>>,
    active: Mutex<Option<(B::Key, B::Scene)>>,
}

impl<B: SceneBackend> SceneCache<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            entries: DashMap::new(),
            active: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Load the scene for `key`, or join the load already in flight
    ///
    /// With `activate`, a valid scene becomes the active one once ready,
    /// whether this caller drove the load or joined it. Activation is
    /// best effort: a scene the backend cannot activate is still returned.
    pub async fn load(&self, key: &B::Key, activate: bool) -> Result<B::Scene> {
        loop {
            let (slot, leader) = self.claim(key);
            if leader {
                return self.lead_load(key, &slot, activate).await;
            }

            let mut status = slot.status.subscribe();
            let settled = status
                .wait_for(|s| {
                    matches!(
                        s,
                        SceneStatus::Loaded(_) | SceneStatus::Unloaded | SceneStatus::Failed(_)
                    )
                })
                .await
                .map(|s| (*s).clone())
                .unwrap_or_else(|_| SceneStatus::Failed(SceneError::cancelled(key)));

            match settled {
                SceneStatus::Loaded(scene) => {
                    tracing::debug!(scene = ?key, "Scene served from cache");
                    if activate {
                        self.activate(key, &scene);
                    }
                    return Ok(scene);
                }
                SceneStatus::Failed(err) => return Err(err),
                // Unloaded underneath us; the next pass starts a fresh load
                _ => continue,
            }
        }
    }

    /// Unload the scene for `key`
    ///
    /// Unknown keys are a no-op. A load still in flight is awaited first.
    /// If the backend fails to unload, the scene stays cached.
    pub async fn unload(&self, key: &B::Key) -> Result<()> {
        let Some(slot) = self.entries.get(key).map(|entry| Arc::clone(entry.value())) else {
            tracing::debug!(scene = ?key, "Unload requested for a scene that is not cached");
            return Ok(());
        };

        let mut status = slot.status.subscribe();
        loop {
            let current = status
                .wait_for(|s| !matches!(s, SceneStatus::Loading))
                .await
                .map(|s| (*s).clone())
                .unwrap_or(SceneStatus::Unloaded);

            match current {
                SceneStatus::Loaded(_) => {
                    let mut claimed = None;
                    slot.status.send_if_modified(|s| {
                        if let SceneStatus::Loaded(scene) = s {
                            let scene = scene.clone();
                            claimed = Some(scene.clone());
                            *s = SceneStatus::Unloading(scene);
                            true
                        } else {
                            false
                        }
                    });
                    if let Some(scene) = claimed {
                        return self.lead_unload(key, &slot, scene).await;
                    }
                }
                SceneStatus::Unloading(_) => {
                    let after = status
                        .wait_for(|s| !matches!(s, SceneStatus::Unloading(_)))
                        .await
                        .map(|s| (*s).clone())
                        .unwrap_or(SceneStatus::Unloaded);
                    return match after {
                        SceneStatus::Loaded(_) => Err(SceneError::unload_failed(
                            key,
                            "concurrent unload of this scene failed",
                        )),
                        _ => Ok(()),
                    };
                }
                SceneStatus::Failed(_) | SceneStatus::Unloaded => return Ok(()),
                SceneStatus::Loading => {}
            }
        }
    }

    /// Whether `key` has an entry, loaded or still loading
    pub fn contains(&self, key: &B::Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Whether the scene for `key` finished loading and is not being unloaded
    pub fn is_loaded(&self, key: &B::Key) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slot| matches!(*slot.status.borrow(), SceneStatus::Loaded(_)))
    }

    pub fn loaded_keys(&self) -> Vec<B::Key> {
        self.entries
            .iter()
            .filter(|entry| matches!(*entry.value().status.borrow(), SceneStatus::Loaded(_)))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// The scene most recently made active through this cache
    pub fn active_scene(&self) -> Option<B::Scene> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, scene)| scene.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Return the slot for `key`, inserting a loading one if absent
    fn claim(&self, key: &B::Key) -> (SlotRef<B>, bool) {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let slot = Arc::new(SceneSlot::loading());
                entry.insert(Arc::clone(&slot));
                (slot, true)
            }
        }
    }

    fn evict(&self, key: &B::Key, slot: &SlotRef<B>) {
        self.entries
            .remove_if(key, |_, current| Arc::ptr_eq(current, slot));
    }

    async fn lead_load(&self, key: &B::Key, slot: &SlotRef<B>, activate: bool) -> Result<B::Scene> {
        let mut guard = PendingGuard {
            cache: self,
            key,
            slot,
            fallback: Some(SceneStatus::Failed(SceneError::cancelled(key))),
            evict: true,
        };

        tracing::debug!(scene = ?key, "Loading scene");
        let result = self.backend.load_additive(key).await;
        guard.disarm();

        match result {
            Ok(scene) => {
                slot.status.send_replace(SceneStatus::Loaded(scene.clone()));
                tracing::info!(scene = ?key, "Scene loaded");
                if activate {
                    self.activate(key, &scene);
                }
                Ok(scene)
            }
            Err(err) => {
                self.evict(key, slot);
                slot.status.send_replace(SceneStatus::Failed(err.clone()));
                tracing::error!(scene = ?key, "Scene load failed: {}", err);
                Err(err)
            }
        }
    }

    async fn lead_unload(&self, key: &B::Key, slot: &SlotRef<B>, scene: B::Scene) -> Result<()> {
        let mut guard = PendingGuard {
            cache: self,
            key,
            slot,
            fallback: Some(SceneStatus::Loaded(scene.clone())),
            evict: false,
        };

        tracing::debug!(scene = ?key, "Unloading scene");
        let result = self.backend.unload_additive(&scene).await;
        guard.disarm();

        match result {
            Ok(()) => {
                self.evict(key, slot);
                self.clear_active(key);
                slot.status.send_replace(SceneStatus::Unloaded);
                tracing::info!(scene = ?key, "Scene unloaded");
                Ok(())
            }
            Err(err) => {
                slot.status.send_replace(SceneStatus::Loaded(scene));
                tracing::error!(scene = ?key, "Scene unload failed: {}", err);
                Err(err)
            }
        }
    }

    fn activate(&self, key: &B::Key, scene: &B::Scene) {
        if !self.backend.is_valid(scene) {
            tracing::warn!(scene = ?key, "Scene is no longer valid, not activating");
            return;
        }

        if let Err(err) = self.backend.set_active(scene) {
            tracing::warn!(scene = ?key, "Scene activation failed: {}", err);
            return;
        }
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) =
            Some((key.clone(), scene.clone()));
        tracing::debug!(scene = ?key, "Activated scene");
    }

    fn clear_active(&self, key: &B::Key) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|(active_key, _)| active_key == key) {
            *active = None;
        }
    }
}

impl<B: SceneBackend> fmt::Debug for SceneCache<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneCache")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Resolvable from a registry when the backend can be built with `Default`
impl<B: SceneBackend + Default> Singleton for SceneCache<B> {
    fn construct(_registry: &SingletonRegistry) -> anyhow::Result<Self> {
        Ok(Self::new(Arc::new(B::default())))
    }
}

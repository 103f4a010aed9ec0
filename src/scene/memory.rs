use super::{ContentRef, Result, SceneBackend, SceneError};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// Scene handle produced by [`MemorySceneBackend`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemoryScene {
    key: ContentRef,
    handle: u64,
}

impl MemoryScene {
    pub fn key(&self) -> &ContentRef {
        &self.key
    }

    /// Unique per load; a reloaded scene gets a new handle
    pub fn handle(&self) -> u64 {
        self.handle
    }
}

/// In-process scene backend with simulated latency and failure injection
///
/// Keeps track of every call it receives so callers can assert on how the
/// cache drove it.
#[derive(Debug, Default)]
pub struct MemorySceneBackend {
    latency: Duration,
    resident: DashMap<ContentRef, u64>,
    load_failures: DashMap<ContentRef, String>,
    unload_failures: DashMap<ContentRef, String>,
    activation_failures: DashMap<ContentRef, String>,
    refused: DashSet<ContentRef>,
    loads: DashMap<ContentRef, usize>,
    unloads: AtomicUsize,
    activations: AtomicUsize,
    next_handle: AtomicU64,
    active: Mutex<Option<ContentRef>>,
}

impl MemorySceneBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay applied to every load and unload
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn fail_loads(&self, key: &ContentRef, message: impl Into<String>) {
        self.load_failures.insert(key.clone(), message.into());
    }

    pub fn fail_unloads(&self, key: &ContentRef, message: impl Into<String>) {
        self.unload_failures.insert(key.clone(), message.into());
    }

    pub fn fail_activations(&self, key: &ContentRef, message: impl Into<String>) {
        self.activation_failures.insert(key.clone(), message.into());
    }

    /// Refuse to even start loading `key`
    pub fn refuse(&self, key: &ContentRef) {
        self.refused.insert(key.clone());
    }

    /// Drop every injected failure for `key`
    pub fn heal(&self, key: &ContentRef) {
        self.load_failures.remove(key);
        self.unload_failures.remove(key);
        self.activation_failures.remove(key);
        self.refused.remove(key);
    }

    /// Load attempts across all keys, failed ones included
    pub fn load_count(&self) -> usize {
        self.loads.iter().map(|entry| *entry.value()).sum()
    }

    pub fn load_count_of(&self, key: &ContentRef) -> usize {
        self.loads.get(key).map_or(0, |count| *count)
    }

    pub fn unload_count(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }

    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    pub fn is_resident(&self, key: &ContentRef) -> bool {
        self.resident.contains_key(key)
    }

    pub fn active(&self) -> Option<ContentRef> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl SceneBackend for MemorySceneBackend {
    type Key = ContentRef;
    type Scene = MemoryScene;

    async fn load_additive(&self, key: &ContentRef) -> Result<MemoryScene> {
        if self.refused.contains(key) {
            return Err(SceneError::not_started(key, "content reference is not addressable"));
        }

        *self.loads.entry(key.clone()).or_insert(0) += 1;
        self.simulate_latency().await;

        if let Some(message) = self.load_failures.get(key).map(|m| m.value().clone()) {
            return Err(SceneError::load_failed(key, message));
        }

        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst) + 1;
        self.resident.insert(key.clone(), handle);
        tracing::trace!(scene = %key, handle, "Memory scene resident");
        Ok(MemoryScene {
            key: key.clone(),
            handle,
        })
    }

    async fn unload_additive(&self, scene: &MemoryScene) -> Result<()> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(message) = self.unload_failures.get(&scene.key).map(|m| m.value().clone()) {
            return Err(SceneError::unload_failed(&scene.key, message));
        }

        self.resident
            .remove_if(&scene.key, |_, handle| *handle == scene.handle);
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref() == Some(&scene.key) {
            *active = None;
        }
        Ok(())
    }

    fn is_valid(&self, scene: &MemoryScene) -> bool {
        self.resident
            .get(&scene.key)
            .is_some_and(|handle| *handle == scene.handle)
    }

    fn set_active(&self, scene: &MemoryScene) -> Result<()> {
        if !self.is_valid(scene) {
            return Err(SceneError::activation(&scene.key, "scene is not resident"));
        }
        if let Some(message) = self.activation_failures.get(&scene.key).map(|m| m.value().clone()) {
            return Err(SceneError::activation(&scene.key, message));
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = Some(scene.key.clone());
        Ok(())
    }
}

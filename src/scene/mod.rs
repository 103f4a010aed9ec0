//! Scene Cache Module
//!
//! Lazily loaded, deduplicated scene content. A [`SceneCache`] sits in front
//! of a [`SceneBackend`] and makes sure every content reference is loaded at
//! most once, however many callers ask for it concurrently.
//!
//! # Example
//!
//! ```rust,ignore
//! use forgecore::scene::{ContentRef, MemorySceneBackend, SceneCache};
//! use std::sync::Arc;
//!
//! let cache = SceneCache::new(Arc::new(MemorySceneBackend::new()));
//! let map = ContentRef::from("SC_DevMap");
//!
//! // Both callers observe the same scene, the backend loads it once
//! let (a, b) = tokio::join!(cache.load(&map, true), cache.load(&map, false));
//! ```

mod backend;
mod cache;
mod error;
mod memory;

pub use backend::{ContentRef, SceneBackend};
pub use cache::SceneCache;
pub use error::{Result, SceneError};
pub use memory::{MemoryScene, MemorySceneBackend};

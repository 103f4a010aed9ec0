use super::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;

/// The streaming side of scene management
///
/// Implementations load and unload units of content additively. The cache
/// guarantees that, for a given key, at most one `load_additive` and one
/// `unload_additive` are in flight at any time.
#[async_trait]
pub trait SceneBackend: Send + Sync + 'static {
    /// Content reference identifying a loadable unit
    type Key: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;

    /// Handle of a loaded scene
    type Scene: Clone + fmt::Debug + Send + Sync + 'static;

    async fn load_additive(&self, key: &Self::Key) -> Result<Self::Scene>;

    async fn unload_additive(&self, scene: &Self::Scene) -> Result<()>;

    /// Whether the handle still refers to a loaded scene
    fn is_valid(&self, scene: &Self::Scene) -> bool;

    /// Make the scene the one new objects are spawned into
    fn set_active(&self, scene: &Self::Scene) -> Result<()>;
}

/// Opaque, addressable reference to a unit of scene content
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentRef(String);

impl ContentRef {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentRef {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

impl From<String> for ContentRef {
    fn from(address: String) -> Self {
        Self(address)
    }
}

impl AsRef<str> for ContentRef {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

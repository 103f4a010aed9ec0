use crate::lifecycle::LifecycleError;
use crate::scene::SceneError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ForgeError>;

/// Errors raised by singleton access, adoption and teardown
#[derive(Debug, Error)]
pub enum SingletonError {
    #[error("Failed to construct singleton {type_name}: {source}")]
    Construction {
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("Re-entrant construction of singleton {type_name}")]
    Reentrant { type_name: &'static str },

    #[error("Singleton {type_name} is already registered with policy {registered}, requested {requested}")]
    PolicyMismatch {
        type_name: &'static str,
        registered: String,
        requested: String,
    },

    #[error("Failed to downcast singleton slot: {type_name}")]
    DowncastFailed { type_name: &'static str },

    #[error("Failed to release singleton {type_name}: {source}")]
    Release {
        type_name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl SingletonError {
    pub(crate) fn construction<T: ?Sized>(source: anyhow::Error) -> Self {
        Self::Construction {
            type_name: std::any::type_name::<T>(),
            source,
        }
    }

    pub(crate) fn reentrant<T: ?Sized>() -> Self {
        Self::Reentrant {
            type_name: std::any::type_name::<T>(),
        }
    }

    pub(crate) fn downcast_failed<T: ?Sized>() -> Self {
        Self::DowncastFailed {
            type_name: std::any::type_name::<T>(),
        }
    }
}

/// Crate-level error covering every subsystem
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error(transparent)]
    Singleton(#[from] SingletonError),

    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Diagnostics error: {0}")]
    Diagnostics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

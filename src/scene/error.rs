//! Scene-specific error types

use std::fmt;
use thiserror::Error;

/// Errors raised by scene loads, unloads and activation
///
/// Cloneable so one failed load can be handed to every caller that was
/// waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    /// The backend refused to begin loading
    #[error("Scene load could not be started for {key}: {message}")]
    NotStarted { key: String, message: String },

    #[error("Failed to load scene {key}: {message}")]
    LoadFailed { key: String, message: String },

    #[error("Failed to unload scene {key}: {message}")]
    UnloadFailed { key: String, message: String },

    #[error("Failed to activate scene {key}: {message}")]
    Activation { key: String, message: String },

    /// The task driving the load went away before it finished
    #[error("Scene load for {key} was cancelled")]
    Cancelled { key: String },
}

impl SceneError {
    pub fn not_started(key: &impl fmt::Debug, message: impl Into<String>) -> Self {
        Self::NotStarted {
            key: format!("{:?}", key),
            message: message.into(),
        }
    }

    pub fn load_failed(key: &impl fmt::Debug, message: impl Into<String>) -> Self {
        Self::LoadFailed {
            key: format!("{:?}", key),
            message: message.into(),
        }
    }

    pub fn unload_failed(key: &impl fmt::Debug, message: impl Into<String>) -> Self {
        Self::UnloadFailed {
            key: format!("{:?}", key),
            message: message.into(),
        }
    }

    pub fn activation(key: &impl fmt::Debug, message: impl Into<String>) -> Self {
        Self::Activation {
            key: format!("{:?}", key),
            message: message.into(),
        }
    }

    pub fn cancelled(key: &impl fmt::Debug) -> Self {
        Self::Cancelled {
            key: format!("{:?}", key),
        }
    }

    /// The content reference this error is about, as it was formatted
    pub fn key(&self) -> &str {
        match self {
            Self::NotStarted { key, .. }
            | Self::LoadFailed { key, .. }
            | Self::UnloadFailed { key, .. }
            | Self::Activation { key, .. }
            | Self::Cancelled { key } => key,
        }
    }
}

/// A specialized Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;

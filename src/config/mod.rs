//! Configuration Module
//!
//! [`ConfigService`] is a key/value view over the process environment that
//! callers can also write to. [`CoreConfig`] is the typed configuration the
//! lifecycle core reads from it.

use crate::error::{ForgeError, Result};
use crate::scene::ContentRef;
use crate::singleton::{Singleton, SingletonRegistry};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::{AsRefStr, Display, EnumString};

pub const BOOTSTRAP_SCENE_KEY: &str = "FORGE_BOOTSTRAP_SCENE";
pub const GAMEPLAY_SCENE_KEY: &str = "FORGE_GAMEPLAY_SCENE";
pub const SETTLE_DELAY_KEY: &str = "FORGE_SETTLE_DELAY_MS";
pub const SERVICE_TIMEOUT_KEY: &str = "FORGE_SERVICE_TIMEOUT_MS";
pub const HOST_POLICY_KEY: &str = "FORGE_HOST_POLICY";

/// Configuration service
#[derive(Clone, Default)]
pub struct ConfigService {
    config: Arc<DashMap<String, String>>,
}

impl ConfigService {
    /// Snapshot of the process environment
    pub fn new() -> Self {
        Self::from_pairs(env::vars())
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let service = Self::default();
        for (key, value) in pairs {
            service.set(key.as_ref(), value.as_ref());
        }
        service
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.config.get(key).map(|v| v.clone())
    }

    pub fn set(&self, key: &str, value: &str) {
        self.config.insert(key.to_string(), value.to_string());
    }

    /// Parse the value under `key`, `None` when unset
    pub fn get_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.trim().parse::<T>().map_err(|e| {
                    ForgeError::Config(format!("Invalid value {:?} for {}: {}", raw, key, e))
                })
            })
            .transpose()
    }
}

impl std::fmt::Debug for ConfigService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigService")
            .field("keys", &self.config.len())
            .finish()
    }
}

impl Singleton for ConfigService {
    fn construct(_registry: &SingletonRegistry) -> anyhow::Result<Self> {
        Ok(Self::new())
    }
}

/// What the host does once the lifecycle has finished
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum HostPolicy {
    /// Exit the process
    #[default]
    Exit,
    /// Raise a stop flag for an embedding loop
    Stop,
}

/// Typed configuration of the lifecycle core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Content loaded and activated during startup
    pub bootstrap_scene: ContentRef,
    /// Content loaded when a new episode starts
    pub gameplay_scene: ContentRef,
    /// Pause between service initialization and readiness
    pub settle_delay_ms: u64,
    /// Upper bound for each service's initialize/shutdown
    pub service_timeout_ms: Option<u64>,
    pub host_policy: HostPolicy,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            bootstrap_scene: ContentRef::from("SC_MainMenu"),
            gameplay_scene: ContentRef::from("SC_DevMap"),
            settle_delay_ms: 5000,
            service_timeout_ms: None,
            host_policy: HostPolicy::Exit,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ForgeError::Config(format!("Invalid core configuration: {}", e)))
    }

    /// Defaults overridden by whatever `FORGE_*` keys the service holds
    pub fn from_config_service(config: &ConfigService) -> Result<Self> {
        let mut core = Self::default();

        if let Some(scene) = config.get(BOOTSTRAP_SCENE_KEY) {
            core.bootstrap_scene = ContentRef::from(scene);
        }
        if let Some(scene) = config.get(GAMEPLAY_SCENE_KEY) {
            core.gameplay_scene = ContentRef::from(scene);
        }
        if let Some(delay) = config.get_parsed::<u64>(SETTLE_DELAY_KEY)? {
            core.settle_delay_ms = delay;
        }
        if let Some(timeout) = config.get_parsed::<u64>(SERVICE_TIMEOUT_KEY)? {
            core.service_timeout_ms = Some(timeout);
        }
        if let Some(policy) = config.get_parsed::<HostPolicy>(HOST_POLICY_KEY)? {
            core.host_policy = policy;
        }

        Ok(core)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn service_timeout(&self) -> Option<Duration> {
        self.service_timeout_ms.map(Duration::from_millis)
    }
}

impl Singleton for CoreConfig {
    fn construct(registry: &SingletonRegistry) -> anyhow::Result<Self> {
        let config = registry.instance::<ConfigService>()?;
        Ok(Self::from_config_service(&config)?)
    }
}

//! Configuration management for the registry adapter.
//!
//! Provides hierarchical configuration loading from multiple sources with priority:
//! 1. Default values (hardcoded)
//! 2. Config file named by `CONFIG_PATH`
//! 3. Override file passed to [`RegistryConfig::with_override_config`]
//! 4. Environment variables prefixed `REGISTRY__` (highest priority)

mod registry;
mod retry;
pub use registry::*;
pub use retry::*;


//---
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;
use crate::ServiceUrl;

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Coordination service address
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Reconnect recovery policy
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Wildcard subscription settings
    #[serde(default)]
    pub wildcard: WildcardConfig,
}

impl RegistryConfig {
    /// Loads defaults, then the optional `CONFIG_PATH` file, then `REGISTRY__*`
    /// environment variables.
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&path));
        }

        let config = builder.add_source(env_source()).build()?;
        Ok(config.try_deserialize()?)
    }

    /// Merges `path` on top of `self`; environment variables still win.
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Checks the settings that would otherwise fail at connect time.
    pub fn validate(&self) -> Result<ServiceUrl> {
        self.connection.registry_url()
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("REGISTRY")
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

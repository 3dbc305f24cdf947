//! Cache configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (CDF_CACHE_*)
//! 2. TOML config file (if CDF_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_MAX_SIZE;

mod validation;

pub use validation::ConfigError;

/// Cache configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (CDF_CACHE_*)
/// 2. TOML config file (if CDF_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Directory holding object files and the metadata file.
    ///
    /// Set via CDF_CACHE_CACHE_DIR environment variable.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Byte budget applied after the cache is opened.
    ///
    /// Set via CDF_CACHE_MAX_SIZE environment variable.
    #[serde(default = "default_max_size")]
    pub max_size: u64,

    /// Key material for encrypting objects at rest.
    ///
    /// Set via CDF_CACHE_ENCRYPTION_KEY environment variable.
    /// Required only when a cache is actually opened.
    #[serde(default)]
    pub encryption_key: Option<String>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cdf-cache")
}

fn default_max_size() -> u64 {
    DEFAULT_MAX_SIZE
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { cache_dir: default_cache_dir(), max_size: default_max_size(), encryption_key: None }
    }
}

impl CacheConfig {
    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `CDF_CACHE_`
    /// 2. TOML file from `CDF_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("CDF_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("CDF_CACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Check that an encryption key is available (deferred until open).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if no encryption key is set.
    pub fn require_encryption_key(&self) -> Result<&str, ConfigError> {
        self.encryption_key.as_deref().ok_or_else(|| ConfigError::Missing {
            field: "encryption_key".into(),
            hint: "Set CDF_CACHE_ENCRYPTION_KEY environment variable".into(),
        })
    }
}

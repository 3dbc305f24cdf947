//! Configuration validation rules.
//!
//! This module provides validation logic for `CacheConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::CacheConfig;
use thiserror::Error;

/// Keys shorter than this are accepted but logged.
const SHORT_KEY_LEN: usize = 16;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl CacheConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `max_size` is 0
    /// - `cache_dir` is empty
    /// - `encryption_key` is set but empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::Invalid { field: "max_size".into(), reason: "must be greater than 0".into() });
        }

        if self.cache_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "cache_dir".into(), reason: "must not be empty".into() });
        }

        if let Some(key) = &self.encryption_key {
            if key.is_empty() {
                return Err(ConfigError::Invalid {
                    field: "encryption_key".into(),
                    reason: "must not be empty when set".into(),
                });
            }
            if key.len() < SHORT_KEY_LEN {
                tracing::warn!(
                    key_len = key.len(),
                    recommended = SHORT_KEY_LEN,
                    "encryption_key is short; consider a longer key"
                );
            }
        }

        Ok(())
    }
}

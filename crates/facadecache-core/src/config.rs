//! Cache configuration
//!
//! Loaded from an optional TOML file; every field falls back to its default.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the cache manager and its commit listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Capacity of the commit-notification queue (back-pressures the sender)
    pub queue_capacity: usize,

    /// Capacity of the outbound event bus
    pub event_bus_capacity: usize,

    /// Log every cascading removal at info level instead of debug
    pub log_cascades: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            event_bus_capacity: 256,
            log_cascades: true,
        }
    }
}

impl CacheConfig {
    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self, CacheError> {
        let config: CacheConfig =
            toml::from_str(content).map_err(|e| CacheError::InvalidConfig {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self, CacheError> {
        let content = std::fs::read_to_string(path).map_err(|source| CacheError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), CacheError> {
        if self.queue_capacity == 0 {
            return Err(CacheError::InvalidConfig {
                message: "queue_capacity must be greater than zero".to_string(),
            });
        }
        if self.event_bus_capacity == 0 {
            return Err(CacheError::InvalidConfig {
                message: "event_bus_capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

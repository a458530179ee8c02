//! Cache configuration.
//!
//! Controls the query cache via `kasa.toml`.

use std::time::Duration;

use serde::Deserialize;

// Default values for cache configuration
const DEFAULT_TTL_MINUTES: u64 = 5;
const DEFAULT_MAX_ENTRIES: usize = 256;

/// Cache configuration from `kasa.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the query cache.
    pub enabled: bool,
    /// Entry lifetime in minutes.
    pub ttl_minutes: u64,
    /// Maximum cached entries before writes are skipped.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_minutes: DEFAULT_TTL_MINUTES,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            ttl_minutes: settings.ttl_minutes,
            max_entries: settings.max_entries,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime as a duration, clamping zero to one minute.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes.max(1) * 60)
    }
}

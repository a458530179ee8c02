//! Process-wide TTL cache for listing reads.
//!
//! One flat key space: page results and detail reads both live here, keyed
//! by [`super::keys`] and swept by prefix on mutation.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::config::CacheConfig;

const METRIC_CACHE_HIT: &str = "kasa_cache_hit_total";
const METRIC_CACHE_MISS: &str = "kasa_cache_miss_total";
const METRIC_CACHE_EXPIRED: &str = "kasa_cache_expired_total";
const METRIC_CACHE_INVALIDATED: &str = "kasa_cache_invalidated_total";

// ============================================================================
// Entries
// ============================================================================

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

// ============================================================================
// Store
// ============================================================================

/// Shared key-value cache with per-entry TTL and prefix invalidation.
///
/// Created once per process and injected into every consumer. Entries are
/// overwritten wholesale, never mutated in place, so individual operations
/// need no coordination beyond the map's own shards. An expired entry reads
/// as a miss and is dropped on observation.
#[derive(Debug)]
pub struct QueryCache {
    entries: DashMap<String, CacheEntry>,
    config: CacheConfig,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config,
        }
    }

    /// Default entry lifetime from configuration.
    pub fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Looks up `key`, treating absent, expired, and undecodable entries as
    /// misses.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        let now = Instant::now();
        let snapshot = self
            .entries
            .get(key)
            .map(|entry| (entry.value.clone(), entry.is_expired(now)));

        match snapshot {
            Some((_, true)) => {
                self.entries.remove(key);
                counter!(METRIC_CACHE_EXPIRED).increment(1);
                self.record_miss(key);
                None
            }
            Some((value, false)) => match serde_json::from_value(value) {
                Ok(decoded) => {
                    counter!(METRIC_CACHE_HIT).increment(1);
                    debug!(cache = "query", outcome = "hit", key, "cache lookup");
                    Some(decoded)
                }
                Err(err) => {
                    self.entries.remove(key);
                    warn!(key, error = %err, "evicting cache entry that no longer decodes");
                    self.record_miss(key);
                    None
                }
            },
            None => {
                self.record_miss(key);
                None
            }
        }
    }

    /// Stores `value` under `key` for `ttl`, overwriting unconditionally.
    ///
    /// Empty result sets are skipped so a cached empty page can never mask
    /// listings created after it was fetched.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        if !self.config.enabled {
            return;
        }

        let encoded = match serde_json::to_value(value) {
            Ok(encoded) => encoded,
            Err(err) => {
                warn!(key, error = %err, "skipping cache write for unserializable value");
                return;
            }
        };
        if !is_cacheable(&encoded) {
            debug!(
                cache = "query",
                outcome = "skip_empty",
                key,
                "not caching empty result set"
            );
            return;
        }
        if self.entries.len() >= self.config.max_entries && !self.entries.contains_key(key) {
            self.purge_expired();
            if self.entries.len() >= self.config.max_entries {
                debug!(cache = "query", outcome = "skip_full", key, "cache at capacity");
                return;
            }
        }

        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: encoded,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Deletes one entry.
    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Deletes every entry whose key starts with `prefix`.
    ///
    /// Called after any listing mutation so stale listing data never
    /// survives a write.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut dropped = 0usize;
        self.entries.retain(|key, _| {
            if key.starts_with(prefix) {
                dropped += 1;
                false
            } else {
                true
            }
        });
        if dropped > 0 {
            counter!(METRIC_CACHE_INVALIDATED).increment(dropped as u64);
            debug!(cache = "query", prefix, dropped, "invalidated cache prefix");
        }
        dropped
    }

    /// Drops every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut dropped = 0usize;
        self.entries.retain(|_, entry| {
            if entry.is_expired(now) {
                dropped += 1;
                false
            } else {
                true
            }
        });
        if dropped > 0 {
            counter!(METRIC_CACHE_EXPIRED).increment(dropped as u64);
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record_miss(&self, key: &str) {
        counter!(METRIC_CACHE_MISS).increment(1);
        debug!(cache = "query", outcome = "miss", key, "cache lookup");
    }
}

/// Rejects values representing empty result sets.
///
/// Covers bare arrays and page-shaped objects carrying an `items` array.
fn is_cacheable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => match fields.get("items") {
            Some(Value::Array(items)) => !items.is_empty(),
            _ => true,
        },
        _ => true,
    }
}

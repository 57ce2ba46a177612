//! Image result cache with TTL expiry and oldest-first eviction.
//!
//! Memoizes generated image URLs per logical key (`quiz_<id>` or a
//! character id) so repeat lookups never re-bill the provider. Entries are
//! persisted through the [`KeyValueStore`] abstraction under a single
//! storage key and expire after a fixed window (30 days by default).
//!
//! Persistence is best-effort by contract: a full store triggers one
//! evict-and-retry pass, and a write that still fails downgrades the cache
//! to memory-only for that entry instead of surfacing an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TokkiError;
use crate::storage::KeyValueStore;

/// Default entry lifetime: 30 days.
pub const DEFAULT_TTL_MS: u64 = 30 * 24 * 60 * 60 * 1000;

/// How many of the oldest entries are dropped per eviction pass.
pub const DEFAULT_EVICTION_BATCH: usize = 5;

/// A single cached image result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Resolved image location (externally hosted).
    pub url: String,
    /// Milliseconds since epoch at insertion. Set once, never mutated.
    pub created_at: u64,
    /// The text used to generate the image. Kept for diagnostics.
    pub source_prompt: String,
}

/// Aggregate view of the cache for status displays.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of live entries.
    pub total_entries: usize,
    /// Age of the oldest entry in milliseconds, if any entries exist.
    pub oldest_age_ms: Option<u64>,
}

/// Keyed image-URL cache with TTL expiry and oldest-first eviction.
///
/// Constructed once per storage key and shared by reference; all methods
/// take `&self` and synchronize on an internal mutex.
pub struct ImageCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    storage: Arc<dyn KeyValueStore>,
    storage_key: &'static str,
    ttl_ms: u64,
    eviction_batch: usize,
}

impl ImageCache {
    /// Load the cache persisted under `storage_key`, purging expired
    /// entries before first use.
    pub fn load(storage: Arc<dyn KeyValueStore>, storage_key: &'static str) -> Self {
        Self::load_with(storage, storage_key, DEFAULT_TTL_MS, DEFAULT_EVICTION_BATCH)
    }

    /// Load with explicit TTL and eviction batch size.
    ///
    /// `eviction_batch` is clamped to a minimum of 1 so a retry pass always
    /// frees something.
    pub fn load_with(
        storage: Arc<dyn KeyValueStore>,
        storage_key: &'static str,
        ttl_ms: u64,
        eviction_batch: usize,
    ) -> Self {
        let entries = load_map(storage.as_ref(), storage_key);
        let cache = Self {
            entries: Mutex::new(entries),
            storage,
            storage_key,
            ttl_ms,
            eviction_batch: eviction_batch.max(1),
        };
        cache.purge_expired();
        cache
    }

    /// Return the live entry for `key`, or `None`.
    ///
    /// An expired entry found here is removed in memory; the persisted map
    /// catches up on the next `store()`/`clear()` rather than paying a
    /// write per read.
    pub fn lookup(&self, key: &str) -> Option<CacheEntry> {
        let now = now_ms();
        let mut guard = self.entries.lock().expect("image cache lock poisoned");
        match guard.get(key) {
            Some(e) if now.saturating_sub(e.created_at) > self.ttl_ms => {
                debug!(key, "cache entry expired, removing");
                guard.remove(key);
                None
            }
            Some(e) => Some(e.clone()),
            None => None,
        }
    }

    /// Insert or overwrite the entry for `key` with the current timestamp.
    ///
    /// Never fails: a capacity-limited store gets one oldest-first
    /// eviction pass and a single retry; any remaining failure leaves the
    /// entry memory-only and logs a warning.
    pub fn store(&self, key: &str, url: &str, source_prompt: &str) {
        let mut guard = self.entries.lock().expect("image cache lock poisoned");
        guard.insert(
            key.to_string(),
            CacheEntry {
                url: url.to_string(),
                created_at: now_ms(),
                source_prompt: source_prompt.to_string(),
            },
        );

        match self.persist(&guard) {
            Ok(()) => {}
            Err(TokkiError::StorageFull) => {
                evict_oldest(&mut guard, self.eviction_batch, key);
                if let Err(e) = self.persist(&guard) {
                    warn!(key, "image cache write still failing after eviction: {}", e);
                }
            }
            Err(e) => warn!(key, "image cache write failed: {}", e),
        }
    }

    /// Remove every entry older than the TTL. Invoked automatically on load.
    pub fn purge_expired(&self) {
        let now = now_ms();
        let ttl = self.ttl_ms;
        let mut guard = self.entries.lock().expect("image cache lock poisoned");
        let before = guard.len();
        guard.retain(|_, e| now.saturating_sub(e.created_at) <= ttl);
        let purged = before - guard.len();
        if purged > 0 {
            debug!(purged, "purged expired image cache entries");
            if let Err(e) = self.persist(&guard) {
                warn!("image cache purge not persisted: {}", e);
            }
        }
    }

    /// Empty the cache and delete its persisted representation.
    pub fn clear(&self) {
        let mut guard = self.entries.lock().expect("image cache lock poisoned");
        guard.clear();
        if let Err(e) = self.storage.remove(self.storage_key) {
            warn!("failed to remove persisted image cache: {}", e);
        }
    }

    /// Aggregate statistics for status displays.
    pub fn stats(&self) -> CacheStats {
        let now = now_ms();
        let guard = self.entries.lock().expect("image cache lock poisoned");
        CacheStats {
            total_entries: guard.len(),
            oldest_age_ms: guard
                .values()
                .map(|e| now.saturating_sub(e.created_at))
                .max(),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("image cache lock poisoned").len()
    }

    /// `true` when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- private helpers ---------------------------------------------------

    fn persist(&self, entries: &HashMap<String, CacheEntry>) -> crate::error::Result<()> {
        let json = serde_json::to_string(entries)
            .map_err(|e| TokkiError::Storage(format!("serialize image cache: {}", e)))?;
        self.storage.set(self.storage_key, &json)
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &str, created_at: u64) {
        let mut guard = self.entries.lock().unwrap();
        if let Some(e) = guard.get_mut(key) {
            e.created_at = created_at;
        }
    }
}

/// Drop the `batch` oldest entries by `created_at`, never the one just
/// written (`keep`).
fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, batch: usize, keep: &str) {
    let mut by_age: Vec<(String, u64)> = entries
        .iter()
        .filter(|(k, _)| k.as_str() != keep)
        .map(|(k, e)| (k.clone(), e.created_at))
        .collect();
    by_age.sort_by_key(|(_, created_at)| *created_at);
    for (key, _) in by_age.into_iter().take(batch) {
        debug!(key = %key, "evicting oldest image cache entry");
        entries.remove(&key);
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Load the persisted map; absent or corrupt data yields an empty map.
fn load_map(storage: &dyn KeyValueStore, storage_key: &str) -> HashMap<String, CacheEntry> {
    match storage.get(storage_key) {
        Ok(Some(json)) => match serde_json::from_str(&json) {
            Ok(map) => map,
            Err(e) => {
                warn!("persisted image cache is corrupt, starting empty: {}", e);
                HashMap::new()
            }
        },
        Ok(None) => HashMap::new(),
        Err(e) => {
            warn!("failed to read persisted image cache, starting empty: {}", e);
            HashMap::new()
        }
    }
}

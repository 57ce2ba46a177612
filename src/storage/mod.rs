//! Key-value storage abstraction for the persisted client state.
//!
//! The original deployment target is browser local storage; everything the
//! core persists (image caches, daily quota record, stored API key) goes
//! through the [`KeyValueStore`] trait so the backing medium can be swapped
//! without touching calling code. Two implementations are provided:
//! [`JsonFileStore`] (one JSON object file, the durable default) and
//! [`MemoryStore`] (tests, ephemeral sessions).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::error::{Result, TokkiError};

/// Storage key for the quiz image cache map.
pub const KEY_IMAGE_CACHE: &str = "tokki_image_cache";
/// Storage key for the character image cache map.
pub const KEY_CHARACTER_IMAGES: &str = "tokki_character_images";
/// Storage key for the daily generation quota record.
pub const KEY_DAILY_QUOTA: &str = "tokki_daily_quota";
/// Storage key for the user-supplied API key.
pub const KEY_API_KEY: &str = "tokki_api_key";

/// Minimal string key-value store.
///
/// `set` must return [`TokkiError::StorageFull`] when the write fails due
/// to a capacity limit, so callers can distinguish "evict and retry" from
/// unrecoverable I/O failures.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;
    /// Store `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
    /// Remove `key` and its value. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Compute the total serialized footprint of a store map in bytes.
///
/// Keys and values both count, mirroring how browser storage quotas are
/// charged. Used by both store implementations for capacity checks.
fn footprint_with(entries: &HashMap<String, String>, key: &str, value: &str) -> usize {
    let mut total = key.len() + value.len();
    for (k, v) in entries {
        if k != key {
            total += k.len() + v.len();
        }
    }
    total
}

// ============================================================================
// MemoryStore
// ============================================================================

/// In-memory store with optional capacity, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    max_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once the combined size of all
    /// keys and values would exceed `max_bytes`.
    pub fn with_capacity(max_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_bytes: Some(max_bytes),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.lock().expect("storage lock poisoned");
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.lock().expect("storage lock poisoned");
        if let Some(max) = self.max_bytes {
            if footprint_with(&guard, key, value) > max {
                return Err(TokkiError::StorageFull);
            }
        }
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.lock().expect("storage lock poisoned");
        guard.remove(key);
        Ok(())
    }
}

// ============================================================================
// JsonFileStore
// ============================================================================

/// Durable store backed by a single JSON object file.
///
/// The whole map is rewritten on every `set`/`remove`; the stores this
/// crate keeps are small (a few KB), so the simplicity wins over an
/// append log. A corrupt or unreadable file degrades to an empty map with
/// a warning rather than failing the caller.
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    max_bytes: Option<usize>,
}

impl JsonFileStore {
    /// Open (or create) a store at the default location `~/.tokki/store.json`.
    pub fn open_default() -> Self {
        Self::open(default_store_path(), None)
    }

    /// Open (or create) a store at `path` with an optional capacity.
    pub fn open(path: PathBuf, max_bytes: Option<usize>) -> Self {
        let entries = load_entries(&path);
        Self {
            path,
            entries: Mutex::new(entries),
            max_bytes,
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TokkiError::Storage(format!("create {}: {}", parent.display(), e)))?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| TokkiError::Storage(format!("serialize store: {}", e)))?;
        std::fs::write(&self.path, json)
            .map_err(|e| TokkiError::Storage(format!("write {}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = self.entries.lock().expect("storage lock poisoned");
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = self.entries.lock().expect("storage lock poisoned");
        if let Some(max) = self.max_bytes {
            if footprint_with(&guard, key, value) > max {
                return Err(TokkiError::StorageFull);
            }
        }
        guard.insert(key.to_string(), value.to_string());
        self.persist(&guard)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self.entries.lock().expect("storage lock poisoned");
        if guard.remove(key).is_some() {
            self.persist(&guard)?;
        }
        Ok(())
    }
}

/// Canonical path for the durable store: `~/.tokki/store.json`.
fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tokki")
        .join("store.json")
}

/// Load the store map from disk; missing or corrupt files yield an empty map.
fn load_entries(path: &Path) -> HashMap<String, String> {
    match std::fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Store file is corrupt, starting empty: {}", e);
                HashMap::new()
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
        Err(e) => {
            warn!("Failed to read store file, starting empty: {}", e);
            HashMap::new()
        }
    }
}

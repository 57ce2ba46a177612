//! Shared wiring for command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};

use tokki::cache::ImageCache;
use tokki::config::Config;
use tokki::quota::DailyQuota;
use tokki::storage::{JsonFileStore, KeyValueStore, KEY_CHARACTER_IMAGES, KEY_IMAGE_CACHE};

/// Load the config, failing with context on a malformed file.
pub(crate) fn load_config() -> Result<Config> {
    Config::load().context("failed to load ~/.tokki/config.toml")
}

/// Open the durable key-value store at its default location.
pub(crate) fn open_storage() -> Arc<dyn KeyValueStore> {
    Arc::new(JsonFileStore::open_default())
}

/// Both image caches over the shared store.
pub(crate) fn open_caches(
    storage: &Arc<dyn KeyValueStore>,
    config: &Config,
) -> (ImageCache, ImageCache) {
    let quiz = ImageCache::load_with(
        Arc::clone(storage),
        KEY_IMAGE_CACHE,
        config.cache.ttl_ms(),
        config.cache.eviction_batch,
    );
    let characters = ImageCache::load_with(
        Arc::clone(storage),
        KEY_CHARACTER_IMAGES,
        config.cache.ttl_ms(),
        config.cache.eviction_batch,
    );
    (quiz, characters)
}

/// The daily quota guard over the shared store.
pub(crate) fn open_quota(storage: &Arc<dyn KeyValueStore>, config: &Config) -> DailyQuota {
    DailyQuota::with_max(Arc::clone(storage), config.quota.daily_max)
}

//! Image result caching with TTL expiry, eviction, and deterministic fallbacks.

pub mod fallback;
pub mod image_cache;

pub use fallback::{fallback_image, FallbackRule, DEFAULT_FALLBACK_URL};
pub use image_cache::{CacheEntry, CacheStats, ImageCache};

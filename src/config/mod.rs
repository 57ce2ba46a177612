//! Configuration loading for the tokki core.
//!
//! A single TOML file at `~/.tokki/config.toml`, every field defaulted so
//! a missing file means "defaults". The session token ceiling and the
//! per-token cost rate live here rather than as constants because they
//! track a specific model's pricing.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TokkiError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub cache: CacheConfig,
    pub quota: QuotaConfig,
    pub budget: BudgetConfig,
    pub health: HealthConfig,
}

/// Provider selection and models.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Chat model identifier.
    pub model: String,
    /// Image model identifier.
    pub image_model: String,
    /// Image resolution, e.g. "1024x1024".
    pub image_size: String,
    /// Image quality tier, e.g. "standard".
    pub image_quality: String,
    /// Optional API key. Environment (`OPENAI_API_KEY`) still wins.
    pub api_key: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            model: crate::providers::openai::DEFAULT_CHAT_MODEL.to_string(),
            image_model: crate::providers::openai::DEFAULT_IMAGE_MODEL.to_string(),
            image_size: "1024x1024".to_string(),
            image_quality: "standard".to_string(),
            api_key: None,
        }
    }
}

/// Image cache tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entry lifetime in days.
    pub ttl_days: u64,
    /// Oldest entries dropped per eviction pass when the store is full.
    pub eviction_batch: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_days: 30,
            eviction_batch: crate::cache::image_cache::DEFAULT_EVICTION_BATCH,
        }
    }
}

impl CacheConfig {
    /// TTL converted to the milliseconds the cache works in.
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_days * 24 * 60 * 60 * 1000
    }
}

/// Daily generation quota.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Billable generations allowed per local calendar day.
    pub daily_max: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            daily_max: crate::quota::DEFAULT_DAILY_MAX,
        }
    }
}

/// Session token budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Hard per-session token ceiling.
    pub session_token_ceiling: u64,
    /// Blended USD rate per 1k tokens for the spend estimate.
    pub cost_per_1k_tokens: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            session_token_ceiling: crate::budget::DEFAULT_TOKEN_CEILING,
            cost_per_1k_tokens: crate::budget::DEFAULT_COST_PER_1K_TOKENS,
        }
    }
}

/// Health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// TCP port the health server binds on.
    pub port: u16,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { port: 8787 }
    }
}

impl Config {
    /// Configuration/state directory: `~/.tokki`.
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tokki")
    }

    /// Canonical config file path: `~/.tokki/config.toml`.
    pub fn path() -> PathBuf {
        Self::dir().join("config.toml")
    }

    /// Load from the canonical path; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load from an explicit path; a missing file yields defaults, a
    /// malformed file is an error (silently losing settings is worse).
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(TokkiError::Config(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        toml::from_str(&data)
            .map_err(|e| TokkiError::Config(format!("failed to parse {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.provider.model, "gpt-4o-mini");
        assert_eq!(config.provider.image_model, "dall-e-3");
        assert_eq!(config.cache.ttl_days, 30);
        assert_eq!(config.quota.daily_max, 3);
        assert_eq!(config.budget.session_token_ceiling, 100_000);
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = Config::load_from_path(&tmp.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[budget]\nsession_token_ceiling = 50000\n\n[quota]\ndaily_max = 5\n",
        )
        .unwrap();
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.budget.session_token_ceiling, 50_000);
        assert_eq!(config.quota.daily_max, 5);
        // Untouched sections keep their defaults.
        assert_eq!(config.cache.ttl_days, 30);
        assert_eq!(config.provider.model, "gpt-4o-mini");
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "this is not toml [[").unwrap();
        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, TokkiError::Config(_)));
    }

    #[test]
    fn test_ttl_ms_conversion() {
        let cache = CacheConfig {
            ttl_days: 1,
            ..Default::default()
        };
        assert_eq!(cache.ttl_ms(), 86_400_000);
    }
}

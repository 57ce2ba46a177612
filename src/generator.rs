//! Composite image generation: cache → provider → deterministic fallback.
//!
//! The one public entry point, [`ImageGenerator::generate`], never fails.
//! Internally the provider path is an explicit `Result` so the reason for
//! a substitution is kept and reported; the caller always receives a
//! usable image URL either way. Billing guards (daily quota) are the
//! caller's responsibility: check-then-increment around this call.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::{fallback_image, ImageCache};
use crate::error::TokkiError;
use crate::providers::{ImageOptions, ImageProvider};

/// Why the deterministic fallback was served instead of a generated image.
#[derive(Debug)]
pub enum FallbackReason {
    /// No usable API credential was configured; no network call was made.
    MissingCredential,
    /// The provider call failed (auth, rate limit, policy, network, or a
    /// malformed response).
    Provider(TokkiError),
}

/// Where the returned URL came from.
#[derive(Debug)]
pub enum ImageSource {
    /// Served from the cache without network access.
    Cache,
    /// Freshly generated by the provider and cached.
    Generated,
    /// Deterministic fallback asset.
    Fallback(FallbackReason),
}

/// Result of a `generate` call. `url` is always usable.
#[derive(Debug)]
pub struct GeneratedImage {
    pub url: String,
    pub source: ImageSource,
}

/// Dependency-injected image generation service.
///
/// Construct once per process with the cache and (when a credential
/// resolved) a provider, and share by reference.
pub struct ImageGenerator {
    cache: Arc<ImageCache>,
    provider: Option<Arc<dyn ImageProvider>>,
    options: ImageOptions,
}

impl ImageGenerator {
    /// Build a generator. `provider` is `None` when no credential is
    /// available; every miss then resolves to a fallback.
    pub fn new(cache: Arc<ImageCache>, provider: Option<Arc<dyn ImageProvider>>) -> Self {
        Self {
            cache,
            provider,
            options: ImageOptions::default(),
        }
    }

    /// Override the resolution/quality sent to the provider.
    pub fn with_options(mut self, options: ImageOptions) -> Self {
        self.options = options;
        self
    }

    /// `true` when a provider credential resolved at construction.
    pub fn can_generate(&self) -> bool {
        self.provider.is_some()
    }

    /// Resolve an image for `key`, generating from `prompt` on a miss.
    ///
    /// Never fails: cache hit → cached URL; miss with a credential →
    /// provider call, cached on success; anything else → keyword-matched
    /// fallback asset.
    pub async fn generate(&self, key: &str, prompt: &str) -> GeneratedImage {
        if let Some(entry) = self.cache.lookup(key) {
            debug!(key, "image cache hit");
            return GeneratedImage {
                url: entry.url,
                source: ImageSource::Cache,
            };
        }

        match self.try_generate(prompt).await {
            Ok(url) => {
                self.cache.store(key, &url, prompt);
                GeneratedImage {
                    url,
                    source: ImageSource::Generated,
                }
            }
            Err(reason) => {
                warn!(key, ?reason, "image generation unavailable, serving fallback");
                GeneratedImage {
                    url: fallback_image(prompt).to_string(),
                    source: ImageSource::Fallback(reason),
                }
            }
        }
    }

    async fn try_generate(&self, prompt: &str) -> Result<String, FallbackReason> {
        let provider = self
            .provider
            .as_ref()
            .ok_or(FallbackReason::MissingCredential)?;
        let templated = template_prompt(prompt);
        provider
            .generate_image(&templated, &self.options)
            .await
            .map(|generated| generated.url)
            .map_err(FallbackReason::Provider)
    }
}

/// Layer the educational-illustration house style on top of a raw prompt.
///
/// The wording biases the model toward bright, child-friendly historical
/// illustrations and away from photo-realism and embedded text.
pub fn template_prompt(prompt: &str) -> String {
    format!(
        "{}, 어린이 역사 교육용 일러스트, 밝고 따뜻한 색감, 친근한 만화풍, \
         텍스트 없이, 한국 전통 문화를 존중하는 묘사",
        prompt.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_FALLBACK_URL;
    use crate::providers::GeneratedUrl;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct MockImageProvider {
        calls: AtomicU32,
        result: Result<String, u16>,
    }

    impl MockImageProvider {
        fn ok(url: &str) -> Self {
            Self {
                calls: AtomicU32::new(0),
                result: Ok(url.to_string()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                calls: AtomicU32::new(0),
                result: Err(status),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ImageProvider for MockImageProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate_image(
            &self,
            _prompt: &str,
            _options: &ImageOptions,
        ) -> crate::error::Result<GeneratedUrl> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            match &self.result {
                Ok(url) => Ok(GeneratedUrl {
                    url: url.clone(),
                    revised_prompt: None,
                }),
                Err(status) => Err(crate::providers::parse_provider_error(*status, "mock error")),
            }
        }
    }

    fn cache() -> Arc<ImageCache> {
        Arc::new(ImageCache::load(
            Arc::new(MemoryStore::new()),
            "test_generator_cache",
        ))
    }

    #[tokio::test]
    async fn test_miss_with_credential_generates_and_caches() {
        let provider = Arc::new(MockImageProvider::ok("https://img/x.png"));
        let generator = ImageGenerator::new(cache(), Some(provider.clone()));

        let first = generator.generate("quiz_1", "세종대왕 초상").await;
        assert_eq!(first.url, "https://img/x.png");
        assert!(matches!(first.source, ImageSource::Generated));

        // Second call for the same key is served from cache — no second
        // network call.
        let second = generator.generate("quiz_1", "세종대왕 초상").await;
        assert_eq!(second.url, "https://img/x.png");
        assert!(matches!(second.source, ImageSource::Cache));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_miss_without_credential_serves_keyword_fallback() {
        let generator = ImageGenerator::new(cache(), None);
        assert!(!generator.can_generate());

        let image = generator.generate("quiz_2", "세종대왕이 만든 글자는?").await;
        assert_eq!(image.url, "/assets/fallback/sejong.png");
        assert!(matches!(
            image.source,
            ImageSource::Fallback(FallbackReason::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_fallback() {
        let provider = Arc::new(MockImageProvider::failing(429));
        let generator = ImageGenerator::new(cache(), Some(provider.clone()));

        let image = generator.generate("quiz_3", "알 수 없는 주제").await;
        assert_eq!(image.url, DEFAULT_FALLBACK_URL);
        match image.source {
            ImageSource::Fallback(FallbackReason::Provider(TokkiError::RateLimited(_))) => {}
            other => panic!("expected rate-limited fallback, got {other:?}"),
        }
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let shared_cache = cache();
        let failing = Arc::new(MockImageProvider::failing(500));
        let generator = ImageGenerator::new(shared_cache.clone(), Some(failing));
        let _ = generator.generate("quiz_4", "prompt").await;
        // Fallback URLs never enter the cache; a later working provider
        // gets a fresh chance.
        assert!(shared_cache.lookup("quiz_4").is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider_entirely() {
        let shared_cache = cache();
        shared_cache.store("quiz_5", "https://img/cached.png", "old prompt");
        let provider = Arc::new(MockImageProvider::ok("https://img/new.png"));
        let generator = ImageGenerator::new(shared_cache, Some(provider.clone()));

        let image = generator.generate("quiz_5", "old prompt").await;
        assert_eq!(image.url, "https://img/cached.png");
        assert_eq!(provider.calls(), 0);
    }

    #[test]
    fn test_template_prompt_layers_house_style() {
        let templated = template_prompt("거북선");
        assert!(templated.starts_with("거북선,"));
        assert!(templated.contains("어린이"), "{templated}");
        assert!(templated.contains("일러스트"), "{templated}");
    }
}

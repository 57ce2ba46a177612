//! Image generation command handler.
//!
//! Demonstrates the caller-side billing discipline: check the daily quota
//! first, generate, and count the action only when the provider actually
//! produced an image (cache hits and fallbacks are free).

use std::sync::Arc;

use anyhow::Result;

use tokki::generator::{ImageGenerator, ImageSource};
use tokki::providers::{ApiCredential, ImageOptions, ImageProvider, OpenAiProvider};

use super::common::{load_config, open_caches, open_quota, open_storage};

/// Handle `tokki generate <key> <prompt>`.
pub(crate) async fn cmd_generate(key: &str, prompt: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage();
    let quota = open_quota(&storage, &config);
    let (quiz_cache, _) = open_caches(&storage, &config);

    // Credential order: environment, stored key, then the config file.
    let credential = ApiCredential::load(storage.as_ref())
        .or_else(|| ApiCredential::resolve(config.provider.api_key.as_deref(), None));
    let cached = quiz_cache.lookup(key).is_some();

    // A miss that will hit the provider is billable; gate it up front.
    if !cached && credential.is_some() && !quota.can_proceed() {
        let status = quota.status();
        println!(
            "Daily quota exhausted ({} of {} used). {}",
            status.count,
            quota.daily_max(),
            status.reset_description
        );
        return Ok(());
    }

    let provider = credential.map(|c| {
        Arc::new(OpenAiProvider::new(
            c,
            &config.provider.model,
            &config.provider.image_model,
        )) as Arc<dyn ImageProvider>
    });
    let generator = ImageGenerator::new(Arc::new(quiz_cache), provider).with_options(ImageOptions {
        size: config.provider.image_size.clone(),
        quality: config.provider.image_quality.clone(),
    });

    let image = generator.generate(key, prompt).await;
    match &image.source {
        ImageSource::Cache => println!("{}  (cached)", image.url),
        ImageSource::Generated => {
            quota.increment();
            let status = quota.status();
            println!("{}  (generated, {} left today)", image.url, status.remaining);
        }
        ImageSource::Fallback(reason) => {
            println!("{}  (fallback: {:?})", image.url, reason);
        }
    }

    Ok(())
}

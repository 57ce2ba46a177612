//! Combined status command handler.

use anyhow::Result;

use tokki::providers::ApiCredential;

use super::common::{load_config, open_caches, open_quota, open_storage};

/// Handle `tokki status`.
pub(crate) fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let storage = open_storage();

    let quota = open_quota(&storage, &config);
    let status = quota.status();
    println!("Daily quota");
    println!(
        "  {} of {} generations used, {} remaining ({})",
        status.count,
        quota.daily_max(),
        status.remaining,
        status.reset_description
    );

    let (quiz_cache, character_cache) = open_caches(&storage, &config);
    println!("Image caches");
    for (label, cache) in [("quiz", &quiz_cache), ("characters", &character_cache)] {
        let stats = cache.stats();
        match stats.oldest_age_ms {
            Some(age) => println!(
                "  {:<12} {} entries, oldest {} day(s)",
                label,
                stats.total_entries,
                age / 86_400_000
            ),
            None => println!("  {:<12} empty", label),
        }
    }

    println!("Session budget");
    println!(
        "  ceiling {} tokens, rate ${:.4}/1k tokens (per-process, in-memory)",
        config.budget.session_token_ceiling, config.budget.cost_per_1k_tokens
    );

    println!("Credential");
    match ApiCredential::load(storage.as_ref()) {
        Some(_) => println!("  configured"),
        None => println!("  not configured — image generation will use fallbacks"),
    }

    Ok(())
}

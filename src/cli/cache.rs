//! Image cache maintenance command handlers.

use anyhow::Result;

use super::common::{load_config, open_caches, open_storage};
use super::CacheSubcommand;

/// Handle `tokki cache` subcommands.
pub(crate) fn cmd_cache(action: CacheSubcommand) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage();
    let (quiz_cache, character_cache) = open_caches(&storage, &config);

    match action {
        CacheSubcommand::Stats => {
            println!("{:<12} {:>8} {:>14}", "Cache", "Entries", "Oldest (days)");
            println!("{}", "-".repeat(36));
            for (label, cache) in [("quiz", &quiz_cache), ("characters", &character_cache)] {
                let stats = cache.stats();
                let oldest = stats
                    .oldest_age_ms
                    .map(|age| (age / 86_400_000).to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<12} {:>8} {:>14}", label, stats.total_entries, oldest);
            }
        }
        CacheSubcommand::Purge => {
            quiz_cache.purge_expired();
            character_cache.purge_expired();
            println!(
                "Purged expired entries; {} quiz / {} character entries remain.",
                quiz_cache.len(),
                character_cache.len()
            );
        }
        CacheSubcommand::Clear => {
            quiz_cache.clear();
            character_cache.clear();
            println!("Cleared both image caches.");
        }
    }

    Ok(())
}

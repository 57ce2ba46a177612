//! Command-line interface: argument types and dispatch.

mod auth;
mod cache;
mod chat;
mod common;
mod generate;
mod quota;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Client core for the Tokki Korean-history quiz app.
#[derive(Debug, Parser)]
#[command(name = "tokki", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show quota, budget, cache, and credential status.
    Status,
    /// Inspect or maintain the image caches.
    Cache {
        #[command(subcommand)]
        action: CacheSubcommand,
    },
    /// Inspect or reset the daily generation quota.
    Quota {
        #[command(subcommand)]
        action: QuotaSubcommand,
    },
    /// Manage the stored API key.
    Auth {
        #[command(subcommand)]
        action: AuthSubcommand,
    },
    /// Resolve an image for a key, generating it on a cache miss.
    Generate {
        /// Logical cache key, e.g. `quiz_7` or a character id.
        key: String,
        /// Generation prompt.
        prompt: String,
    },
    /// Ask the history-teacher character one question.
    Chat {
        /// The question to ask.
        message: String,
    },
    /// Serve the health endpoint until interrupted.
    Health {
        /// Port override; defaults to the configured port.
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Debug, Subcommand)]
pub enum CacheSubcommand {
    /// Entry counts and ages for both image caches.
    Stats,
    /// Drop expired entries now.
    Purge,
    /// Empty both caches and their persisted state.
    Clear,
}

#[derive(Debug, Subcommand)]
pub enum QuotaSubcommand {
    /// Today's count, remaining generations, and reset time.
    Status,
    /// Drop the persisted quota record.
    Reset,
}

#[derive(Debug, Subcommand)]
pub enum AuthSubcommand {
    /// Store an API key in the local key-value store.
    Set {
        /// The key to store.
        key: String,
    },
    /// Report whether a credential currently resolves, and from where.
    Status,
    /// Remove the stored API key.
    Forget,
}

/// Dispatch a parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Status => status::cmd_status(),
        Command::Cache { action } => cache::cmd_cache(action),
        Command::Quota { action } => quota::cmd_quota(action),
        Command::Auth { action } => auth::cmd_auth(action),
        Command::Generate { key, prompt } => generate::cmd_generate(&key, &prompt).await,
        Command::Chat { message } => chat::cmd_chat(&message).await,
        Command::Health { port } => {
            let config = tokki::config::Config::load()?;
            let port = port.unwrap_or(config.health.port);
            tokki::health::serve(port).await?;
            Ok(())
        }
    }
}

//! Stored-credential command handlers.

use anyhow::Result;

use tokki::providers::ApiCredential;

use super::common::open_storage;
use super::AuthSubcommand;

/// Handle `tokki auth` subcommands.
pub(crate) fn cmd_auth(action: AuthSubcommand) -> Result<()> {
    let storage = open_storage();

    match action {
        AuthSubcommand::Set { key } => {
            ApiCredential::save(storage.as_ref(), &key)?;
            println!("API key stored.");
        }
        AuthSubcommand::Status => {
            let from_env = std::env::var("OPENAI_API_KEY")
                .map(|k| !k.trim().is_empty())
                .unwrap_or(false);
            match ApiCredential::load(storage.as_ref()) {
                Some(_) if from_env => println!("Credential resolves from OPENAI_API_KEY."),
                Some(_) => println!("Credential resolves from the stored key."),
                None => println!("No credential configured."),
            }
        }
        AuthSubcommand::Forget => {
            ApiCredential::forget(storage.as_ref())?;
            println!("Stored API key removed.");
        }
    }

    Ok(())
}

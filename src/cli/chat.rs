//! One-shot chat command handler.

use std::sync::Arc;

use anyhow::{bail, Result};

use tokki::budget::{BudgetedChat, SessionTokenTracker};
use tokki::error::TokkiError;
use tokki::providers::{ApiCredential, ChatMessage, ChatOptions, ChatProvider, OpenAiProvider};

use super::common::{load_config, open_storage};

/// System prompt for the history-teacher character.
const TEACHER_PERSONA: &str = "너는 아이들에게 한국사를 쉽고 재미있게 알려주는 \
                               다정한 역사 선생님이야. 짧고 친근하게 대답해줘.";

/// Handle `tokki chat <message>`.
pub(crate) async fn cmd_chat(message: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage();

    let Some(credential) = ApiCredential::load(storage.as_ref())
        .or_else(|| ApiCredential::resolve(config.provider.api_key.as_deref(), None))
    else {
        bail!("{}", TokkiError::MissingApiKey);
    };

    let provider = Arc::new(OpenAiProvider::new(
        credential,
        &config.provider.model,
        &config.provider.image_model,
    ));
    let tracker = Arc::new(SessionTokenTracker::with_limits(
        config.budget.session_token_ceiling,
        config.budget.cost_per_1k_tokens,
    ));
    let chat = BudgetedChat::new(provider, tracker.clone());

    let messages = vec![ChatMessage::system(TEACHER_PERSONA), ChatMessage::user(message)];
    let response = chat
        .chat(messages, None, ChatOptions::new().with_temperature(0.7))
        .await?;

    println!("{}", response.content);
    let usage = tracker.usage();
    if usage.total_tokens > 0 {
        println!(
            "\n[{} tokens, est. ${:.4}]",
            usage.total_tokens, usage.estimated_cost
        );
    }

    Ok(())
}

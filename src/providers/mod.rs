//! AI provider abstraction: chat completions and image generation.
//!
//! The quiz app talks to exactly one external service (the OpenAI REST
//! API), but both call sites are behind traits so the composite flows can
//! be exercised with mock providers in tests.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TokkiError};

pub use openai::{ApiCredential, OpenAiProvider};

// ============================================================================
// Chat types
// ============================================================================

/// Message author role, serialized in the provider wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Tunables for a single chat call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Token accounting reported by the provider for one completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A completed chat turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// Assistant message content.
    pub content: String,
    /// Token usage, when the provider reported it.
    pub usage: Option<Usage>,
}

impl ChatResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }
}

// ============================================================================
// Image types
// ============================================================================

/// Resolution and quality tier for an image generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOptions {
    /// Resolution, e.g. `"1024x1024"`.
    pub size: String,
    /// Quality tier, e.g. `"standard"`.
    pub quality: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
        }
    }
}

/// A successfully generated image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedUrl {
    /// Externally hosted image location.
    pub url: String,
    /// The provider's expanded/rewritten prompt, when reported.
    pub revised_prompt: Option<String>,
}

// ============================================================================
// Provider traits
// ============================================================================

/// A chat-completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Short provider identifier for logs.
    fn name(&self) -> &str;

    /// Model used when the caller passes `None`.
    fn default_model(&self) -> &str;

    /// Run one chat completion.
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<ChatResponse>;
}

/// An image-generation backend.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Short provider identifier for logs.
    fn name(&self) -> &str;

    /// Generate one image for `prompt`.
    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<GeneratedUrl>;
}

// ============================================================================
// Error normalization
// ============================================================================

/// Map a provider HTTP failure to the crate error taxonomy.
///
/// `body` is the raw response text; when it is the standard OpenAI error
/// envelope (`{"error": {"message": ...}}`) the inner message is used.
pub fn parse_provider_error(status: u16, body: &str) -> TokkiError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => TokkiError::InvalidApiKey(message),
        429 => TokkiError::RateLimited(message),
        400 => TokkiError::ContentPolicy(message),
        _ => TokkiError::Provider(format!("HTTP {}: {}", status, message)),
    }
}

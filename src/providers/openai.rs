//! OpenAI REST client: chat completions and image generation.
//!
//! Credential priority: `OPENAI_API_KEY` environment variable → key stored
//! in the key-value store under [`KEY_API_KEY`]. Keys are never hardcoded
//! and never appear in `Debug` output.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{Result, TokkiError};
use crate::storage::{KeyValueStore, KEY_API_KEY};

use super::{
    parse_provider_error, ChatMessage, ChatOptions, ChatProvider, ChatResponse, GeneratedUrl,
    ImageOptions, ImageProvider, Usage,
};

/// OpenAI REST API base.
const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Default chat model when none is configured or passed at call time.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Default image model.
pub const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";

// ── Credential ───────────────────────────────────────────────────────────────

/// A bearer API key with redacted `Debug` output.
#[derive(Clone)]
pub struct ApiCredential(String);

impl std::fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiCredential([REDACTED])")
    }
}

impl ApiCredential {
    /// Resolve a credential in priority order: environment, then stored key.
    ///
    /// Empty strings are treated as absent.
    pub fn resolve(env_key: Option<&str>, stored_key: Option<&str>) -> Option<Self> {
        if let Some(k) = env_key.filter(|k| !k.trim().is_empty()) {
            return Some(Self(k.trim().to_string()));
        }
        if let Some(k) = stored_key.filter(|k| !k.trim().is_empty()) {
            return Some(Self(k.trim().to_string()));
        }
        None
    }

    /// Resolve from `OPENAI_API_KEY` or the key persisted in `storage`.
    pub fn load(storage: &dyn KeyValueStore) -> Option<Self> {
        let env_key = std::env::var("OPENAI_API_KEY").ok();
        let stored_key = storage.get(KEY_API_KEY).ok().flatten();
        Self::resolve(env_key.as_deref(), stored_key.as_deref())
    }

    /// Persist a user-supplied key to `storage`.
    pub fn save(storage: &dyn KeyValueStore, key: &str) -> Result<()> {
        storage.set(KEY_API_KEY, key.trim())
    }

    /// Remove the persisted key.
    pub fn forget(storage: &dyn KeyValueStore) -> Result<()> {
        storage.remove(KEY_API_KEY)
    }

    fn bearer(&self) -> &str {
        &self.0
    }
}

// ── Provider ─────────────────────────────────────────────────────────────────

/// Client for the OpenAI chat-completion and image-generation endpoints.
pub struct OpenAiProvider {
    credential: ApiCredential,
    model: String,
    image_model: String,
    client: Client,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl OpenAiProvider {
    /// Build a provider from an already-resolved credential.
    pub fn new(credential: ApiCredential, model: &str, image_model: &str) -> Self {
        Self {
            credential,
            model: model.to_string(),
            image_model: image_model.to_string(),
            client: build_client(),
        }
    }

    /// Build from the environment / stored key, with default models.
    ///
    /// Returns `None` when no credential is available — billable calls are
    /// impossible without one, and the image path falls back instead.
    pub fn from_storage(storage: &dyn KeyValueStore) -> Option<Self> {
        let credential = ApiCredential::load(storage)?;
        Some(Self::new(credential, DEFAULT_CHAT_MODEL, DEFAULT_IMAGE_MODEL))
    }

    /// Build the chat-completions request body.
    fn build_chat_body(&self, messages: &[ChatMessage], model: &str, options: &ChatOptions) -> Value {
        let wire_messages: Vec<Value> = messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let mut body = json!({
            "model": model,
            "messages": wire_messages,
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    /// Build the image-generation request body.
    fn build_image_body(&self, prompt: &str, options: &ImageOptions) -> Value {
        json!({
            "model": self.image_model,
            "prompt": prompt,
            "n": 1,
            "size": options.size,
            "quality": options.quality,
        })
    }

    /// Pull the assistant message text out of a chat-completions response.
    fn extract_chat_text(response: &Value) -> Option<String> {
        response["choices"][0]["message"]["content"]
            .as_str()
            .map(String::from)
    }

    /// Parse token usage from a chat-completions response, if reported.
    fn extract_chat_usage(response: &Value) -> Option<Usage> {
        let usage = response.get("usage")?;
        let prompt = usage["prompt_tokens"].as_u64()? as u32;
        let completion = usage["completion_tokens"].as_u64()? as u32;
        Some(Usage::new(prompt, completion))
    }

    /// Pull the image URL (and optional revised prompt) out of an
    /// image-generation response.
    fn extract_image(response: &Value) -> Option<GeneratedUrl> {
        let first = response["data"].as_array()?.first()?;
        Some(GeneratedUrl {
            url: first["url"].as_str()?.to_string(),
            revised_prompt: first["revised_prompt"].as_str().map(String::from),
        })
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = format!("{}/{}", OPENAI_API_BASE, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.credential.bearer())
            .json(body)
            .send()
            .await
            .map_err(|e| TokkiError::Provider(format!("request to {} failed: {}", path, e)))?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| TokkiError::Provider(format!("failed to parse {} response: {}", path, e)));
        }

        let status = response.status().as_u16();
        let body_text = response.text().await.unwrap_or_default();
        Err(parse_provider_error(status, &body_text))
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<ChatResponse> {
        let model = model.unwrap_or(&self.model);
        let body = self.build_chat_body(&messages, model, &options);
        debug!(model, "chat completion request");

        let json = self.post("chat/completions", &body).await?;
        let content = Self::extract_chat_text(&json)
            .ok_or_else(|| TokkiError::Provider("chat response had no message content".into()))?;

        let mut response = ChatResponse::text(content);
        if let Some(usage) = Self::extract_chat_usage(&json) {
            response = response.with_usage(usage);
        }
        Ok(response)
    }
}

#[async_trait]
impl ImageProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate_image(&self, prompt: &str, options: &ImageOptions) -> Result<GeneratedUrl> {
        let body = self.build_image_body(prompt, options);
        debug!(model = %self.image_model, "image generation request");

        let json = self.post("images/generations", &body).await?;
        Self::extract_image(&json)
            .ok_or_else(|| TokkiError::Provider("image response had no url".into()))
    }
}

fn build_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .build()
        .expect("failed to build HTTP client")
}

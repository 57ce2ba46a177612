//! Error types for the tokki client core.
//!
//! Network-facing code catches provider failures at the boundary and maps
//! them to the variants below so callers can branch on condition rather
//! than parsing message strings. The image-generation path additionally
//! swallows all of these and degrades to a fallback image (see
//! [`crate::generator`]).

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TokkiError>;

/// All error conditions surfaced by the tokki core.
#[derive(Debug, Error)]
pub enum TokkiError {
    /// A billable action was attempted with no usable API key configured.
    #[error("no API key configured: set OPENAI_API_KEY or store a key with `tokki auth set`")]
    MissingApiKey,

    /// The provider rejected the supplied API key (HTTP 401).
    #[error("API key was rejected by the provider: {0}")]
    InvalidApiKey(String),

    /// The provider rate-limited the request (HTTP 429). Retryable.
    #[error("provider rate limit hit, try again shortly: {0}")]
    RateLimited(String),

    /// The provider rejected the request content (HTTP 400).
    #[error("request was rejected by the provider's content policy: {0}")]
    ContentPolicy(String),

    /// The session token ceiling has been reached. Terminal until restart.
    #[error("session token budget exhausted ({used} of {ceiling} tokens used)")]
    SessionLimit { used: u64, ceiling: u64 },

    /// The daily generation quota is used up.
    #[error("daily generation quota exhausted ({0})")]
    QuotaExceeded(String),

    /// A persistence write failed because the store is at capacity.
    #[error("key-value store capacity exceeded")]
    StorageFull,

    /// Any other persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Any other provider/network failure.
    #[error("provider error: {0}")]
    Provider(String),
}

impl TokkiError {
    /// Whether the caller may usefully retry the same request.
    ///
    /// Session and daily limits are terminal for their scope; auth and
    /// content-policy failures need user action first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TokkiError::RateLimited(_) | TokkiError::Provider(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_limit_message_names_both_counts() {
        let err = TokkiError::SessionLimit {
            used: 100_001,
            ceiling: 100_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("100001"), "{msg}");
        assert!(msg.contains("100000"), "{msg}");
    }

    #[test]
    fn test_retryable_classification() {
        assert!(TokkiError::RateLimited("429".into()).is_retryable());
        assert!(TokkiError::Provider("timeout".into()).is_retryable());
        assert!(!TokkiError::MissingApiKey.is_retryable());
        assert!(!TokkiError::SessionLimit {
            used: 1,
            ceiling: 1
        }
        .is_retryable());
        assert!(!TokkiError::ContentPolicy("nope".into()).is_retryable());
    }
}

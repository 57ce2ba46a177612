//! Session token budget: a hard circuit breaker on cumulative LLM spend.
//!
//! Tracks prompt+completion tokens for the lifetime of one process as a
//! safety net in front of a user-supplied API key. Intentionally not
//! persisted — a restart is the only way back from `Exhausted`. There is
//! no sliding window and no transition back to `Active`.
//!
//! [`BudgetedChat`] wraps any [`ChatProvider`] so every call site gets the
//! check-before / record-after discipline without repeating it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::{Result, TokkiError};
use crate::providers::{ChatMessage, ChatOptions, ChatProvider, ChatResponse};
use crate::utils::cost::estimate_cost;

/// Default per-session token ceiling.
pub const DEFAULT_TOKEN_CEILING: u64 = 100_000;

/// Default blended USD rate per 1k tokens for the spend estimate.
pub const DEFAULT_COST_PER_1K_TOKENS: f64 = 0.002;

/// Session lifecycle relative to the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Below the ceiling; calls may proceed.
    Active,
    /// Ceiling crossed; terminal until process restart.
    Exhausted,
}

/// Read-only usage projection.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionUsage {
    /// Prompt + completion tokens consumed since process start.
    pub total_tokens: u64,
    /// Completed chat calls since process start.
    pub call_count: u64,
    /// Linear USD estimate of the session's spend.
    pub estimated_cost: f64,
}

/// In-memory accumulator of session token usage with a hard ceiling.
///
/// Counters are atomics; the tracker is shared via `Arc` and never
/// persisted.
pub struct SessionTokenTracker {
    total_tokens: AtomicU64,
    call_count: AtomicU64,
    ceiling: u64,
    cost_per_1k_tokens: f64,
}

impl SessionTokenTracker {
    /// Create a tracker with the default ceiling and cost rate.
    pub fn new() -> Self {
        Self::with_limits(DEFAULT_TOKEN_CEILING, DEFAULT_COST_PER_1K_TOKENS)
    }

    /// Create a tracker with an explicit ceiling and cost rate.
    pub fn with_limits(ceiling: u64, cost_per_1k_tokens: f64) -> Self {
        Self {
            total_tokens: AtomicU64::new(0),
            call_count: AtomicU64::new(0),
            ceiling,
            cost_per_1k_tokens,
        }
    }

    /// The configured ceiling.
    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    /// Gate a chat call: `Err(SessionLimit)` once the ceiling is reached,
    /// before any network traffic.
    pub fn check_and_reserve(&self) -> Result<()> {
        let used = self.total_tokens.load(Ordering::Relaxed);
        if used >= self.ceiling {
            return Err(TokkiError::SessionLimit {
                used,
                ceiling: self.ceiling,
            });
        }
        Ok(())
    }

    /// Record usage from a completed call. Post-success only.
    pub fn record_usage(&self, prompt_tokens: u32, completion_tokens: u32) {
        let total = u64::from(prompt_tokens) + u64::from(completion_tokens);
        let after = self.total_tokens.fetch_add(total, Ordering::Relaxed) + total;
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if after >= self.ceiling {
            warn!(
                used = after,
                ceiling = self.ceiling,
                "session token ceiling reached; further chat calls will be refused"
            );
        }
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        if self.total_tokens.load(Ordering::Relaxed) >= self.ceiling {
            SessionState::Exhausted
        } else {
            SessionState::Active
        }
    }

    /// Point-in-time usage projection.
    pub fn usage(&self) -> SessionUsage {
        let total_tokens = self.total_tokens.load(Ordering::Relaxed);
        SessionUsage {
            total_tokens,
            call_count: self.call_count.load(Ordering::Relaxed),
            estimated_cost: estimate_cost(total_tokens, self.cost_per_1k_tokens),
        }
    }
}

impl Default for SessionTokenTracker {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// BudgetedChat — decorator that enforces the session budget
// ---------------------------------------------------------------------------

/// A [`ChatProvider`] decorator enforcing the session token budget.
///
/// Checks the tracker before forwarding each `chat()` call and records the
/// reported usage after a success. A failed inner call records nothing.
pub struct BudgetedChat {
    inner: Arc<dyn ChatProvider>,
    tracker: Arc<SessionTokenTracker>,
}

impl BudgetedChat {
    pub fn new(inner: Arc<dyn ChatProvider>, tracker: Arc<SessionTokenTracker>) -> Self {
        Self { inner, tracker }
    }

    /// The shared tracker, for status displays.
    pub fn tracker(&self) -> &Arc<SessionTokenTracker> {
        &self.tracker
    }
}

impl std::fmt::Debug for BudgetedChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetedChat")
            .field("provider", &self.inner.name())
            .field("state", &self.tracker.state())
            .finish()
    }
}

#[async_trait]
impl ChatProvider for BudgetedChat {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<ChatResponse> {
        self.tracker.check_and_reserve()?;
        let response = self.inner.chat(messages, model, options).await?;
        if let Some(usage) = response.usage {
            self.tracker
                .record_usage(usage.prompt_tokens, usage.completion_tokens);
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Usage;
    use std::sync::atomic::AtomicU32;

    /// Mock provider that counts invocations, so tests can assert that a
    /// budget refusal produced zero network-side effects.
    struct CountingProvider {
        calls: AtomicU32,
        usage: Option<Usage>,
        fail: bool,
    }

    impl CountingProvider {
        fn ok_with(usage: Usage) -> Self {
            Self {
                calls: AtomicU32::new(0),
                usage: Some(usage),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicU32::new(0),
                usage: None,
                fail: true,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::Relaxed)
        }
    }

    #[async_trait]
    impl ChatProvider for CountingProvider {
        fn name(&self) -> &str {
            "mock"
        }

        fn default_model(&self) -> &str {
            "mock-model"
        }

        async fn chat(
            &self,
            _messages: Vec<ChatMessage>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<ChatResponse> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            if self.fail {
                return Err(TokkiError::Provider("inner failure".into()));
            }
            let mut response = ChatResponse::text("ok");
            if let Some(usage) = self.usage {
                response = response.with_usage(usage);
            }
            Ok(response)
        }
    }

    #[test]
    fn test_fresh_tracker_is_active() {
        let tracker = SessionTokenTracker::new();
        assert_eq!(tracker.state(), SessionState::Active);
        assert!(tracker.check_and_reserve().is_ok());
        let usage = tracker.usage();
        assert_eq!(usage.total_tokens, 0);
        assert_eq!(usage.call_count, 0);
        assert_eq!(usage.estimated_cost, 0.0);
    }

    #[test]
    fn test_usage_accumulates_monotonically() {
        let tracker = SessionTokenTracker::new();
        tracker.record_usage(1_000, 500);
        tracker.record_usage(2_000, 700);
        let usage = tracker.usage();
        assert_eq!(usage.total_tokens, 4_200);
        assert_eq!(usage.call_count, 2);
    }

    #[test]
    fn test_ceiling_crossing_is_terminal() {
        let tracker = SessionTokenTracker::with_limits(100_000, DEFAULT_COST_PER_1K_TOKENS);
        // One response reporting 100_001 total tokens crosses the ceiling.
        tracker.record_usage(90_001, 10_000);
        assert_eq!(tracker.state(), SessionState::Exhausted);
        match tracker.check_and_reserve() {
            Err(TokkiError::SessionLimit { used, ceiling }) => {
                assert_eq!(used, 100_001);
                assert_eq!(ceiling, 100_000);
            }
            other => panic!("expected SessionLimit, got {other:?}"),
        }
        // No way back within the session.
        assert_eq!(tracker.state(), SessionState::Exhausted);
    }

    #[test]
    fn test_exactly_at_ceiling_is_exhausted() {
        let tracker = SessionTokenTracker::with_limits(1_500, DEFAULT_COST_PER_1K_TOKENS);
        tracker.record_usage(1_000, 500);
        assert!(tracker.check_and_reserve().is_err());
    }

    #[test]
    fn test_estimated_cost_uses_configured_rate() {
        let tracker = SessionTokenTracker::with_limits(DEFAULT_TOKEN_CEILING, 0.01);
        tracker.record_usage(2_000, 0);
        let usage = tracker.usage();
        assert!((usage.estimated_cost - 0.02).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_budgeted_chat_passes_through_and_records() {
        let inner = Arc::new(CountingProvider::ok_with(Usage::new(1_000, 500)));
        let tracker = Arc::new(SessionTokenTracker::new());
        let chat = BudgetedChat::new(inner.clone(), tracker.clone());

        let response = chat
            .chat(vec![ChatMessage::user("안녕")], None, ChatOptions::new())
            .await
            .expect("chat should succeed");
        assert_eq!(response.content, "ok");
        assert_eq!(inner.calls(), 1);
        assert_eq!(tracker.usage().total_tokens, 1_500);
        assert_eq!(tracker.usage().call_count, 1);
    }

    #[tokio::test]
    async fn test_budgeted_chat_refuses_without_touching_provider() {
        let inner = Arc::new(CountingProvider::ok_with(Usage::new(10, 10)));
        let tracker = Arc::new(SessionTokenTracker::with_limits(100, DEFAULT_COST_PER_1K_TOKENS));
        tracker.record_usage(100, 1); // over ceiling
        let chat = BudgetedChat::new(inner.clone(), tracker);

        let result = chat
            .chat(vec![ChatMessage::user("hi")], None, ChatOptions::new())
            .await;
        assert!(matches!(result, Err(TokkiError::SessionLimit { .. })));
        assert_eq!(inner.calls(), 0, "refusal must happen before any network call");
    }

    #[tokio::test]
    async fn test_budgeted_chat_records_nothing_on_inner_error() {
        let inner = Arc::new(CountingProvider::failing());
        let tracker = Arc::new(SessionTokenTracker::new());
        let chat = BudgetedChat::new(inner, tracker.clone());

        let result = chat
            .chat(vec![ChatMessage::user("hi")], None, ChatOptions::new())
            .await;
        assert!(result.is_err());
        assert_eq!(tracker.usage().total_tokens, 0);
        assert_eq!(tracker.usage().call_count, 0);
    }

    #[tokio::test]
    async fn test_scenario_crossing_then_next_call_fails_fast() {
        // A call whose response reports just over the ceiling exhausts the
        // session; the very next attempt fails before the provider is hit.
        let inner = Arc::new(CountingProvider::ok_with(Usage::new(90_001, 10_000)));
        let tracker = Arc::new(SessionTokenTracker::new());
        let chat = BudgetedChat::new(inner.clone(), tracker.clone());

        chat.chat(vec![ChatMessage::user("첫 질문")], None, ChatOptions::new())
            .await
            .expect("first call succeeds");
        assert_eq!(tracker.state(), SessionState::Exhausted);

        let second = chat
            .chat(vec![ChatMessage::user("둘째 질문")], None, ChatOptions::new())
            .await;
        assert!(matches!(second, Err(TokkiError::SessionLimit { .. })));
        assert_eq!(inner.calls(), 1, "second attempt must not reach the provider");
    }
}

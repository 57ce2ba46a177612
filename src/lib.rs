//! Client core for the Tokki Korean-history quiz app.
//!
//! Three small collaborating services sit between the quiz UI and the AI
//! provider, all operating against a persistent key-value store:
//!
//! - [`cache::ImageCache`] memoizes generated image URLs per logical key,
//!   with 30-day expiry and oldest-first eviction under storage pressure.
//! - [`quota::DailyQuota`] caps billable image generations per local
//!   calendar day, resetting at midnight.
//! - [`budget::SessionTokenTracker`] is a hard, in-memory circuit breaker
//!   on cumulative chat token spend for one process lifetime.
//!
//! [`generator::ImageGenerator`] composes cache, provider, and the
//! deterministic fallback table into the one image entry point the UI
//! calls; [`budget::BudgetedChat`] wraps the chat provider with the
//! check-before / record-after budget discipline. All services are
//! explicitly constructed and dependency-injected — no hidden globals.

pub mod budget;
pub mod cache;
pub mod config;
pub mod error;
pub mod generator;
pub mod health;
pub mod providers;
pub mod quota;
pub mod storage;
pub mod utils;

pub use error::{Result, TokkiError};

//! Daily generation quota, scoped to local calendar days.
//!
//! Caps how many billable image generations a user may issue per day
//! (3 by default). The counter lives under a single storage key as
//! `{date: "YYYY-MM-DD", count}` and is implicitly reset whenever the
//! stored date is not today; the reset is only written back on the next
//! `increment()`.
//!
//! This is a best-effort single-process guard, not billing-grade
//! enforcement: concurrent writers race last-writer-wins, and the cost of
//! a lost increment is one extra generation.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::{KeyValueStore, KEY_DAILY_QUOTA};

/// Default daily cap on billable generations.
pub const DEFAULT_DAILY_MAX: u32 = 3;

/// Persisted counter state. Singleton: one record per installation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQuotaRecord {
    /// Local calendar date the count belongs to, `YYYY-MM-DD`.
    pub date: String,
    /// Successful generations issued on that date.
    pub count: u32,
}

/// Point-in-time quota view for callers and status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaStatus {
    /// Generations already used today.
    pub count: u32,
    /// Generations still available today.
    pub remaining: u32,
    /// Human-readable time until the local-midnight reset.
    pub reset_description: String,
}

/// Calendar-day generation counter over a [`KeyValueStore`].
///
/// The record itself never clamps; callers must gate billable actions on
/// [`DailyQuota::can_proceed`] and call [`DailyQuota::increment`] only
/// after the action succeeded.
pub struct DailyQuota {
    storage: Arc<dyn KeyValueStore>,
    daily_max: u32,
}

impl DailyQuota {
    /// Create a quota guard with the default daily cap.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self::with_max(storage, DEFAULT_DAILY_MAX)
    }

    /// Create a quota guard with an explicit daily cap.
    pub fn with_max(storage: Arc<dyn KeyValueStore>, daily_max: u32) -> Self {
        Self { storage, daily_max }
    }

    /// The configured daily cap.
    pub fn daily_max(&self) -> u32 {
        self.daily_max
    }

    /// Read the current status.
    ///
    /// A record from a previous calendar date reads as `count = 0` without
    /// writing the reset — the corrected record lands with the next
    /// `increment()`.
    pub fn status(&self) -> QuotaStatus {
        let count = self.count_today();
        QuotaStatus {
            count,
            remaining: self.daily_max.saturating_sub(count),
            reset_description: describe_reset(Local::now().naive_local()),
        }
    }

    /// `true` while at least one generation remains today.
    pub fn can_proceed(&self) -> bool {
        self.count_today() < self.daily_max
    }

    /// Count one successful billable action.
    ///
    /// Same-day records increment; anything else (absent, stale, corrupt)
    /// is overwritten with `{today, 1}`. Must be called only after the
    /// action succeeded, never speculatively.
    pub fn increment(&self) {
        let today = today_key();
        let count = match self.read_record() {
            Some(r) if r.date == today => r.count.saturating_add(1),
            _ => 1,
        };
        let record = DailyQuotaRecord { date: today, count };
        match serde_json::to_string(&record) {
            Ok(json) => {
                if let Err(e) = self.storage.set(KEY_DAILY_QUOTA, &json) {
                    warn!("daily quota not persisted, count may be lost: {}", e);
                }
            }
            Err(e) => warn!("failed to serialize daily quota record: {}", e),
        }
    }

    /// Drop the persisted record entirely (maintenance CLI).
    pub fn reset(&self) {
        if let Err(e) = self.storage.remove(KEY_DAILY_QUOTA) {
            warn!("failed to reset daily quota: {}", e);
        }
    }

    // -- private helpers ---------------------------------------------------

    fn count_today(&self) -> u32 {
        match self.read_record() {
            Some(r) if r.date == today_key() => r.count,
            _ => 0,
        }
    }

    fn read_record(&self) -> Option<DailyQuotaRecord> {
        let json = self.storage.get(KEY_DAILY_QUOTA).ok().flatten()?;
        match serde_json::from_str(&json) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("daily quota record is corrupt, treating as absent: {}", e);
                None
            }
        }
    }
}

/// Today's local calendar date as `YYYY-MM-DD`.
///
/// Uses the local timezone by design; DST and timezone-change edges are an
/// accepted simplification for a client-side guard.
fn today_key() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Korean human-readable time remaining until local midnight,
/// e.g. `"5시간 32분 후 초기화"`.
fn describe_reset(now: NaiveDateTime) -> String {
    let midnight = now
        .date()
        .checked_add_signed(Duration::days(1))
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or(now);
    let left = midnight.signed_duration_since(now);
    let hours = left.num_hours();
    let minutes = left.num_minutes() % 60;
    if hours > 0 {
        format!("{}시간 {}분 후 초기화", hours, minutes)
    } else {
        format!("{}분 후 초기화", minutes.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::NaiveDate;

    fn quota_on(storage: Arc<dyn KeyValueStore>) -> DailyQuota {
        DailyQuota::new(storage)
    }

    fn put_record(storage: &dyn KeyValueStore, date: &str, count: u32) {
        let json = serde_json::to_string(&DailyQuotaRecord {
            date: date.to_string(),
            count,
        })
        .unwrap();
        storage.set(KEY_DAILY_QUOTA, &json).unwrap();
    }

    #[test]
    fn test_fresh_status_is_zero() {
        let quota = quota_on(Arc::new(MemoryStore::new()));
        let status = quota.status();
        assert_eq!(status.count, 0);
        assert_eq!(status.remaining, DEFAULT_DAILY_MAX);
        assert!(quota.can_proceed());
    }

    #[test]
    fn test_increment_counts_up_to_max() {
        let quota = quota_on(Arc::new(MemoryStore::new()));
        quota.increment();
        quota.increment();
        assert!(quota.can_proceed(), "2 of 3 used, one left");
        quota.increment();
        let status = quota.status();
        assert_eq!(status.count, 3);
        assert_eq!(status.remaining, 0);
        assert!(!quota.can_proceed(), "cap reached");
    }

    #[test]
    fn test_stale_date_reads_as_reset() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        put_record(storage.as_ref(), "2020-01-01", 3);
        let quota = quota_on(Arc::clone(&storage));
        let status = quota.status();
        assert_eq!(status.count, 0, "previous day's count must not carry over");
        assert_eq!(status.remaining, DEFAULT_DAILY_MAX);
        assert!(quota.can_proceed());
    }

    #[test]
    fn test_status_read_does_not_write_reset() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        put_record(storage.as_ref(), "2020-01-01", 3);
        let quota = quota_on(Arc::clone(&storage));
        let _ = quota.status();
        // The stale record is still on disk untouched.
        let raw = storage.get(KEY_DAILY_QUOTA).unwrap().unwrap();
        let record: DailyQuotaRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.date, "2020-01-01");
        assert_eq!(record.count, 3);
    }

    #[test]
    fn test_increment_after_rollover_overwrites_record() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        put_record(storage.as_ref(), "2020-01-01", 3);
        let quota = quota_on(Arc::clone(&storage));
        quota.increment();
        let raw = storage.get(KEY_DAILY_QUOTA).unwrap().unwrap();
        let record: DailyQuotaRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.date, today_key());
        assert_eq!(record.count, 1);
    }

    #[test]
    fn test_corrupt_record_treated_as_absent() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        storage.set(KEY_DAILY_QUOTA, "{broken").unwrap();
        let quota = quota_on(Arc::clone(&storage));
        assert_eq!(quota.status().count, 0);
        quota.increment();
        assert_eq!(quota.status().count, 1);
    }

    #[test]
    fn test_reset_removes_record() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let quota = quota_on(Arc::clone(&storage));
        quota.increment();
        quota.reset();
        assert!(storage.get(KEY_DAILY_QUOTA).unwrap().is_none());
        assert_eq!(quota.status().count, 0);
    }

    #[test]
    fn test_custom_daily_max() {
        let quota = DailyQuota::with_max(Arc::new(MemoryStore::new()), 1);
        assert!(quota.can_proceed());
        quota.increment();
        assert!(!quota.can_proceed());
    }

    #[test]
    fn test_reset_description_midday() {
        let noon = NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(describe_reset(noon), "12시간 0분 후 초기화");
    }

    #[test]
    fn test_reset_description_just_before_midnight() {
        let late = NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_opt(23, 58, 30)
            .unwrap();
        assert_eq!(describe_reset(late), "1분 후 초기화");
    }
}

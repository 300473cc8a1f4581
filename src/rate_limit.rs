//! Fixed-window request rate limiting.
//!
//! Each (client key, category) pair owns one counter that resets entirely
//! when its window elapses. O(1) memory per key, O(1) per check; bursts at
//! window boundaries are possible.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::SharedClock;
use crate::error::{Error, Result};

/// Category names used by the booking flow.
pub mod category {
    pub const GLOBAL: &str = "global";
    pub const APPOINTMENT: &str = "appointment";
    pub const CONTACT: &str = "contact";
}

/// Limit parameters for one action category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(with = "humantime_serde")]
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitSettings {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

/// Named action categories and their limits. Categories are data, not code:
/// callers may configure any set they need.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub categories: HashMap<String, RateLimitSettings>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        let mut categories = HashMap::new();
        categories.insert(
            category::GLOBAL.to_string(),
            RateLimitSettings::new(Duration::from_secs(24 * 60 * 60), 1000),
        );
        categories.insert(
            category::APPOINTMENT.to_string(),
            RateLimitSettings::new(Duration::from_secs(60 * 60), 5),
        );
        categories.insert(
            category::CONTACT.to_string(),
            RateLimitSettings::new(Duration::from_secs(10 * 60), 3),
        );
        Self { categories }
    }
}

impl RateLimitConfig {
    pub fn settings(&self, category: &str) -> Result<&RateLimitSettings> {
        self.categories
            .get(category)
            .ok_or_else(|| Error::Config(format!("unknown rate limit category '{}'", category)))
    }
}

/// One counter over the current window.
#[derive(Debug, Clone)]
struct WindowRecord {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Per-key, per-category request counters over rolling fixed windows.
///
/// The whole table sits behind one mutex so the check-then-increment in
/// [`RateLimiter::should_limit`] is atomic with respect to other calls on
/// the same key.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: SharedClock,
    records: Mutex<HashMap<String, WindowRecord>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn record_key(key: &str, category: &str) -> String {
        format!("{}:{}", key, category)
    }

    fn window(settings: &RateLimitSettings) -> Result<TimeDelta> {
        TimeDelta::from_std(settings.window)
            .map_err(|e| Error::Config(format!("rate limit window out of range: {}", e)))
    }

    /// Counts this call against `(key, category)` and reports whether the
    /// post-increment count exceeds the category limit.
    ///
    /// Every call counts, including ones that end up denied, so callers must
    /// invoke this at most once per logical request.
    pub fn should_limit(&self, key: &str, category: &str) -> Result<bool> {
        let settings = self.config.settings(category)?;
        let window = Self::window(settings)?;
        let now = self.clock.now();

        let mut records = self.lock_records()?;
        let record = records
            .entry(Self::record_key(key, category))
            .or_insert_with(|| WindowRecord {
                count: 0,
                reset_at: now + window,
            });

        if now > record.reset_at {
            record.count = 0;
            record.reset_at = now + window;
        }

        record.count += 1;
        let limited = record.count > settings.max_requests;
        if limited {
            tracing::warn!(key, category, count = record.count, "rate limit exceeded");
        }
        Ok(limited)
    }

    /// Remaining quota for `(key, category)` without counting the call.
    pub fn remaining_requests(&self, key: &str, category: &str) -> Result<u32> {
        let settings = self.config.settings(category)?;
        let now = self.clock.now();

        let records = self.lock_records()?;
        match records.get(&Self::record_key(key, category)) {
            Some(record) if now <= record.reset_at => {
                Ok(settings.max_requests.saturating_sub(record.count))
            }
            _ => Ok(settings.max_requests),
        }
    }

    /// Time until the current window for `(key, category)` ends; zero when no
    /// record exists or the window already elapsed.
    pub fn time_until_reset(&self, key: &str, category: &str) -> Result<Duration> {
        let now = self.clock.now();

        let records = self.lock_records()?;
        match records.get(&Self::record_key(key, category)) {
            Some(record) if record.reset_at > now => Ok((record.reset_at - now)
                .to_std()
                .unwrap_or(Duration::ZERO)),
            _ => Ok(Duration::ZERO),
        }
    }

    /// Wipes all tracked counters. Administrative/testing operation.
    pub fn clear_all(&self) -> Result<()> {
        self.lock_records()?.clear();
        Ok(())
    }

    fn lock_records(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, WindowRecord>>> {
        self.records
            .lock()
            .map_err(|_| Error::Internal("rate limit table lock poisoned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn limiter() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 4, 10, 8, 0, 0).unwrap(),
        ));
        let limiter = RateLimiter::new(RateLimitConfig::default(), clock.clone());
        (limiter, clock)
    }

    #[test]
    fn allows_up_to_max_then_limits() {
        let (limiter, _clock) = limiter();

        for _ in 0..5 {
            assert!(!limiter
                .should_limit("1.2.3.4", category::APPOINTMENT)
                .unwrap());
        }
        assert!(limiter
            .should_limit("1.2.3.4", category::APPOINTMENT)
            .unwrap());
    }

    #[test]
    fn window_resets_after_expiry() {
        let (limiter, clock) = limiter();

        for _ in 0..6 {
            limiter.should_limit("1.2.3.4", category::APPOINTMENT).unwrap();
        }
        assert!(limiter
            .should_limit("1.2.3.4", category::APPOINTMENT)
            .unwrap());

        clock.advance(TimeDelta::hours(1) + TimeDelta::seconds(1));

        assert!(!limiter
            .should_limit("1.2.3.4", category::APPOINTMENT)
            .unwrap());
        // The post-reset call itself counted.
        assert_eq!(
            limiter
                .remaining_requests("1.2.3.4", category::APPOINTMENT)
                .unwrap(),
            4
        );
    }

    #[test]
    fn remaining_requests_does_not_mutate() {
        let (limiter, _clock) = limiter();

        limiter.should_limit("1.2.3.4", category::APPOINTMENT).unwrap();
        for _ in 0..10 {
            assert_eq!(
                limiter
                    .remaining_requests("1.2.3.4", category::APPOINTMENT)
                    .unwrap(),
                4
            );
        }
    }

    #[test]
    fn remaining_is_full_quota_for_unknown_key_or_expired_window() {
        let (limiter, clock) = limiter();

        assert_eq!(
            limiter
                .remaining_requests("unseen", category::APPOINTMENT)
                .unwrap(),
            5
        );

        limiter.should_limit("1.2.3.4", category::APPOINTMENT).unwrap();
        clock.advance(TimeDelta::hours(2));
        assert_eq!(
            limiter
                .remaining_requests("1.2.3.4", category::APPOINTMENT)
                .unwrap(),
            5
        );
    }

    #[test]
    fn categories_are_counted_independently() {
        let (limiter, _clock) = limiter();

        for _ in 0..5 {
            limiter.should_limit("1.2.3.4", category::APPOINTMENT).unwrap();
        }
        assert!(limiter
            .should_limit("1.2.3.4", category::APPOINTMENT)
            .unwrap());
        assert!(!limiter.should_limit("1.2.3.4", category::GLOBAL).unwrap());
        assert!(!limiter.should_limit("1.2.3.4", category::CONTACT).unwrap());
    }

    #[test]
    fn time_until_reset_counts_down() {
        let (limiter, clock) = limiter();

        assert_eq!(
            limiter
                .time_until_reset("1.2.3.4", category::APPOINTMENT)
                .unwrap(),
            Duration::ZERO
        );

        limiter.should_limit("1.2.3.4", category::APPOINTMENT).unwrap();
        assert_eq!(
            limiter
                .time_until_reset("1.2.3.4", category::APPOINTMENT)
                .unwrap(),
            Duration::from_secs(60 * 60)
        );

        clock.advance(TimeDelta::minutes(45));
        assert_eq!(
            limiter
                .time_until_reset("1.2.3.4", category::APPOINTMENT)
                .unwrap(),
            Duration::from_secs(15 * 60)
        );

        clock.advance(TimeDelta::minutes(20));
        assert_eq!(
            limiter
                .time_until_reset("1.2.3.4", category::APPOINTMENT)
                .unwrap(),
            Duration::ZERO
        );
    }

    #[test]
    fn clear_all_restores_full_quota() {
        let (limiter, _clock) = limiter();

        for _ in 0..6 {
            limiter.should_limit("1.2.3.4", category::APPOINTMENT).unwrap();
        }
        limiter.clear_all().unwrap();

        assert_eq!(
            limiter
                .remaining_requests("1.2.3.4", category::APPOINTMENT)
                .unwrap(),
            5
        );
        assert!(!limiter
            .should_limit("1.2.3.4", category::APPOINTMENT)
            .unwrap());
    }

    #[test]
    fn unknown_category_is_a_config_error() {
        let (limiter, _clock) = limiter();

        let err = limiter.should_limit("1.2.3.4", "newsletter").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}

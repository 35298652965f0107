//! Per-account backoff for rate-limited upstream calls.
//!
//! Each account carries its own failure counter. Consecutive rate limits
//! walk up a backoff table; once the table is exhausted, requests for the
//! account are skipped until a cool-down window has passed.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

/// Backoff steps in minutes, indexed by consecutive failures.
pub const DEFAULT_BACKOFF_MINUTES: [u64; 5] = [15, 30, 60, 120, 300];

/// Default cool-down before a fully backed-off account is retried.
pub const DEFAULT_MAX_WAIT_HOURS: i64 = 6;

/// Substrings that mark an error message as a rate-limit response.
static RATE_LIMIT_KEYWORDS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    vec![
        "rate limit",
        "too many requests",
        "429",
        "rate_limit_exceeded",
        "quota exceeded",
        "requests per",
        "limit reached",
    ]
});

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Decides whether an error message describes a rate limit.
pub trait ErrorClassifier: Send + Sync {
    fn is_rate_limited(&self, message: &str) -> bool;
}

/// Case-insensitive keyword match against the error text.
///
/// This is a heuristic. Unrelated text containing "limit reached" matches,
/// and a provider rewording its errors will slip through.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    keywords: Vec<String>,
}

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::with_keywords(RATE_LIMIT_KEYWORDS.iter().copied())
    }
}

impl KeywordClassifier {
    /// Builds a classifier from an explicit keyword list.
    pub fn with_keywords<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().to_lowercase())
                .collect(),
        }
    }

    /// Adds extra keywords on top of the current list.
    pub fn extend<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords
            .extend(keywords.into_iter().map(|k| k.as_ref().to_lowercase()));
        self
    }
}

impl ErrorClassifier for KeywordClassifier {
    fn is_rate_limited(&self, message: &str) -> bool {
        let lower = message.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Rate-limit bookkeeping for one account.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountRateState {
    /// Rate limits since the last success.
    pub consecutive_errors: u32,
    /// Time of the most recent rate limit since the last success.
    pub last_error_time: Option<DateTime<Utc>>,
    /// Rate limits over the process lifetime.
    pub total_rate_limits: u64,
}

/// Tracks rate-limit state per account.
///
/// State lives in a `DashMap`, so every read-modify-write on one account
/// holds that entry's write lock and concurrent recordings for the same
/// account are serialized.
pub struct RateLimiter {
    states: DashMap<String, AccountRateState>,
    backoff_minutes: Vec<u64>,
    clock: Arc<dyn Clock>,
    classifier: Arc<dyn ErrorClassifier>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    /// Creates a limiter with the default table, wall clock and keyword classifier.
    pub fn new() -> Self {
        Self::with_parts(
            DEFAULT_BACKOFF_MINUTES.to_vec(),
            Arc::new(SystemClock),
            Arc::new(KeywordClassifier::default()),
        )
    }

    /// Creates a limiter from explicit parts.
    ///
    /// An empty backoff table falls back to the default one.
    pub fn with_parts(
        backoff_minutes: Vec<u64>,
        clock: Arc<dyn Clock>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        let backoff_minutes = if backoff_minutes.is_empty() {
            DEFAULT_BACKOFF_MINUTES.to_vec()
        } else {
            backoff_minutes
        };

        Self {
            states: DashMap::new(),
            backoff_minutes,
            clock,
            classifier,
        }
    }

    /// Returns true if the error looks like a rate-limit response.
    pub fn is_rate_limited_error(&self, error: &dyn std::error::Error) -> bool {
        self.classifier.is_rate_limited(&error.to_string())
    }

    fn delay_minutes_for(&self, consecutive_errors: u32) -> u64 {
        let last = self.backoff_minutes.len() - 1;
        let index = (consecutive_errors.saturating_sub(1) as usize).min(last);
        self.backoff_minutes[index]
    }

    /// Backoff delay in seconds for the account's current failure streak.
    ///
    /// Unknown accounts are registered with a zero state.
    pub fn get_backoff_delay_secs(&self, account: &str) -> u64 {
        let state = self.states.entry(account.to_string()).or_default();
        self.delay_minutes_for(state.consecutive_errors) * 60
    }

    /// Records a rate-limit failure for the account.
    pub fn record_rate_limit(&self, account: &str, error: &dyn std::error::Error) {
        let now = self.clock.now();
        let (consecutive, total) = {
            let mut state = self.states.entry(account.to_string()).or_default();
            state.consecutive_errors += 1;
            state.last_error_time = Some(now);
            state.total_rate_limits += 1;
            (state.consecutive_errors, state.total_rate_limits)
        };

        warn!(
            account,
            consecutive,
            total,
            delay_minutes = self.delay_minutes_for(consecutive),
            error = %error,
            "Rate limit hit"
        );
    }

    /// Clears the failure streak after a successful call.
    pub fn record_success(&self, account: &str) {
        if let Some(mut state) = self.states.get_mut(account) {
            if state.consecutive_errors > 0 {
                info!(account, "Account recovered from rate limiting");
                state.consecutive_errors = 0;
                state.last_error_time = None;
            }
        }
    }

    /// Returns true while a fully backed-off account is still cooling down.
    pub fn should_skip_request(&self, account: &str, max_wait_hours: i64) -> bool {
        let Some(state) = self.states.get(account) else {
            return false;
        };

        if (state.consecutive_errors as usize) < self.backoff_minutes.len() {
            return false;
        }

        match state.last_error_time {
            Some(last) => {
                // Out-of-range windows never expire.
                let window = TimeDelta::try_hours(max_wait_hours).unwrap_or(TimeDelta::MAX);
                self.clock.now() - last < window
            }
            None => false,
        }
    }

    /// Returns a snapshot of the account's state, if any.
    pub fn state(&self, account: &str) -> Option<AccountRateState> {
        self.states.get(account).map(|s| s.clone())
    }

    /// Resets an account to the zero state and returns what it held before.
    pub fn reset(&self, account: &str) -> Option<AccountRateState> {
        let previous = self
            .states
            .get_mut(account)
            .map(|mut s| std::mem::take(&mut *s));
        if previous.is_some() {
            info!(account, "Rate limit record reset");
        }
        previous
    }

    /// Human-readable report over all known accounts, sorted by name.
    pub fn get_status_summary(&self) -> String {
        if self.states.is_empty() {
            return "No rate limit data available".to_string();
        }

        let mut accounts: Vec<(String, AccountRateState)> = self
            .states
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        accounts.sort_by(|a, b| a.0.cmp(&b.0));

        let mut summary = String::from("Rate limit status:");
        for (account, state) in accounts {
            if state.consecutive_errors > 0 {
                let last = state
                    .last_error_time
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "Unknown".to_string());
                let _ = write!(
                    summary,
                    "\n  {}: {} consecutive errors, last at {}, total: {}",
                    account, state.consecutive_errors, last, state.total_rate_limits
                );
            } else {
                let _ = write!(
                    summary,
                    "\n  {}: OK (total rate limits: {})",
                    account, state.total_rate_limits
                );
            }
        }
        summary
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Clock that only moves when told to.
    pub(crate) struct ManualClock(Mutex<DateTime<Utc>>);

    impl ManualClock {
        pub(crate) fn new() -> Self {
            Self(Mutex::new(
                DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
            ))
        }

        pub(crate) fn advance(&self, delta: TimeDelta) {
            let mut now = self.0.lock().unwrap();
            *now += delta;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.0.lock().unwrap()
        }
    }

    #[derive(Debug)]
    struct FakeError(&'static str);

    impl std::fmt::Display for FakeError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl std::error::Error for FakeError {}

    fn limiter_with_clock() -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_parts(
            DEFAULT_BACKOFF_MINUTES.to_vec(),
            clock.clone(),
            Arc::new(KeywordClassifier::default()),
        );
        (limiter, clock)
    }

    #[test]
    fn test_classifier_keywords() {
        let limiter = RateLimiter::new();
        assert!(limiter.is_rate_limited_error(&FakeError("HTTP 429: slow down")));
        assert!(limiter.is_rate_limited_error(&FakeError("Too Many Requests")));
        assert!(limiter.is_rate_limited_error(&FakeError("Quota Exceeded for model")));
        assert!(!limiter.is_rate_limited_error(&FakeError("connection reset by peer")));
    }

    #[test]
    fn test_classifier_is_pluggable() {
        let classifier = KeywordClassifier::with_keywords(["resource_exhausted"]);
        assert!(classifier.is_rate_limited("RESOURCE_EXHAUSTED: try later"));
        assert!(!classifier.is_rate_limited("429"));

        let extended = KeywordClassifier::default().extend(["throttled"]);
        assert!(extended.is_rate_limited("Request throttled"));
        assert!(extended.is_rate_limited("429"));
    }

    #[test]
    fn test_backoff_follows_table() {
        let (limiter, _) = limiter_with_clock();
        assert_eq!(limiter.get_backoff_delay_secs("alice"), 15 * 60);
        assert_eq!(limiter.state("alice"), Some(AccountRateState::default()));

        let mut previous = 0;
        for n in 1..=8u32 {
            limiter.record_rate_limit("alice", &FakeError("429"));
            let expected =
                DEFAULT_BACKOFF_MINUTES[((n - 1) as usize).min(DEFAULT_BACKOFF_MINUTES.len() - 1)]
                    * 60;
            let delay = limiter.get_backoff_delay_secs("alice");
            assert_eq!(delay, expected, "after {} rate limits", n);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_success_resets_streak_but_not_total() {
        let (limiter, _) = limiter_with_clock();
        limiter.record_rate_limit("bob", &FakeError("rate limit"));
        limiter.record_rate_limit("bob", &FakeError("rate limit"));
        limiter.record_success("bob");

        let state = limiter.state("bob").unwrap();
        assert_eq!(state.consecutive_errors, 0);
        assert_eq!(state.last_error_time, None);
        assert_eq!(state.total_rate_limits, 2);
    }

    #[test]
    fn test_success_on_unknown_account_is_noop() {
        let limiter = RateLimiter::new();
        limiter.record_success("ghost");
        assert!(limiter.state("ghost").is_none());
    }

    #[test]
    fn test_skip_flips_at_max_wait_boundary() {
        let (limiter, clock) = limiter_with_clock();
        assert!(!limiter.should_skip_request("carol", 6));

        for _ in 0..4 {
            limiter.record_rate_limit("carol", &FakeError("429"));
        }
        assert!(!limiter.should_skip_request("carol", 6));

        limiter.record_rate_limit("carol", &FakeError("429"));
        assert!(limiter.should_skip_request("carol", 6));

        clock.advance(TimeDelta::hours(6) - TimeDelta::seconds(1));
        assert!(limiter.should_skip_request("carol", 6));

        clock.advance(TimeDelta::seconds(1));
        assert!(!limiter.should_skip_request("carol", 6));
    }

    #[test]
    fn test_skip_window_out_of_range() {
        let (limiter, clock) = limiter_with_clock();
        for _ in 0..5 {
            limiter.record_rate_limit("erin", &FakeError("429"));
        }

        assert!(limiter.should_skip_request("erin", i64::MAX));
        assert!(!limiter.should_skip_request("erin", -1));

        clock.advance(TimeDelta::days(365));
        assert!(limiter.should_skip_request("erin", i64::MAX));
    }

    #[test]
    fn test_reset_returns_previous_state() {
        let (limiter, _) = limiter_with_clock();
        limiter.record_rate_limit("dave", &FakeError("429"));

        let previous = limiter.reset("dave").unwrap();
        assert_eq!(previous.consecutive_errors, 1);
        assert_eq!(previous.total_rate_limits, 1);
        assert_eq!(limiter.state("dave"), Some(AccountRateState::default()));
        assert!(limiter.reset("nobody").is_none());
    }

    #[test]
    fn test_status_summary() {
        let (limiter, _) = limiter_with_clock();
        assert_eq!(limiter.get_status_summary(), "No rate limit data available");

        limiter.record_rate_limit("zed", &FakeError("429"));
        limiter.get_backoff_delay_secs("amy");

        let summary = limiter.get_status_summary();
        assert!(summary.starts_with("Rate limit status:"));
        assert!(summary.contains("amy: OK (total rate limits: 0)"));
        assert!(summary.contains("zed: 1 consecutive errors, last at 12:00:00, total: 1"));
        assert!(summary.find("amy").unwrap() < summary.find("zed").unwrap());
    }

    #[test]
    fn test_concurrent_recordings_are_not_lost() {
        let limiter = Arc::new(RateLimiter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        limiter.record_rate_limit("shared", &FakeError("429"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = limiter.state("shared").unwrap();
        assert_eq!(state.consecutive_errors, 800);
        assert_eq!(state.total_rate_limits, 800);
    }
}

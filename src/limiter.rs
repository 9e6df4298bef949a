//! Fixed-window request counters.
//!
//! One [`FixedWindowLimiter`] bounds lookups per data source (one-minute
//! windows, per-source limits) and another bounds `/api/*` requests per
//! client address at the HTTP boundary (1000 per 15 minutes).
//!
//! Counters are keyed by `(subject, now / window)`. A request is rejected,
//! without incrementing, when the counter already reached the subject's
//! limit. Bursts of up to twice the limit across a window boundary are an
//! accepted property of fixed windows.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Default)]
struct Windows {
    bucket: u64,
    counters: HashMap<(String, u64), u32>,
}

/// Fixed-window counter shared across concurrent requests.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    window_ms: u64,
    default_limit: u32,
    limits: HashMap<String, u32>,
    windows: Mutex<Windows>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, default_limit: u32) -> Self {
        Self {
            window_ms: (window.as_millis() as u64).max(1),
            default_limit,
            limits: HashMap::new(),
            windows: Mutex::new(Windows::default()),
        }
    }

    /// Set the limit for one subject.
    pub fn with_limit(mut self, subject: impl Into<String>, limit: u32) -> Self {
        self.limits.insert(subject.into(), limit);
        self
    }

    pub fn limit_for(&self, subject: &str) -> u32 {
        self.limits
            .get(subject)
            .copied()
            .unwrap_or(self.default_limit)
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    /// Count a request for `subject` in the current window.
    pub fn allow(&self, subject: &str) -> bool {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.allow_at(subject, now_ms)
    }

    /// Count a request for `subject` at an explicit time (ms since the epoch).
    pub fn allow_at(&self, subject: &str, now_ms: u64) -> bool {
        let bucket = now_ms / self.window_ms;
        let limit = self.limit_for(subject);

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        if bucket > windows.bucket {
            windows.bucket = bucket;
            windows.counters.retain(|(_, b), _| *b >= bucket);
        }

        let count = windows
            .counters
            .entry((subject.to_string(), bucket))
            .or_insert(0);
        if *count >= limit {
            return false;
        }
        *count += 1;
        true
    }

    /// Requests already counted for `subject` in the window containing `now_ms`.
    pub fn count_at(&self, subject: &str, now_ms: u64) -> u32 {
        let bucket = now_ms / self.window_ms;
        let windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        windows
            .counters
            .get(&(subject.to_string(), bucket))
            .copied()
            .unwrap_or(0)
    }

    /// Number of live counters (used to check pruning).
    pub fn tracked_windows(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .counters
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const MINUTE: u64 = 60_000;

    #[test]
    fn allows_up_to_limit_then_rejects() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 50).with_limit("FDA", 3);
        let t = 10 * MINUTE;
        assert!(limiter.allow_at("FDA", t));
        assert!(limiter.allow_at("FDA", t + 1));
        assert!(limiter.allow_at("FDA", t + 2));
        assert!(!limiter.allow_at("FDA", t + 3));
        // Rejection does not increment.
        assert_eq!(limiter.count_at("FDA", t), 3);
    }

    #[test]
    fn unknown_subject_uses_default_limit() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 2);
        assert_eq!(limiter.limit_for("HPA"), 2);
        assert!(limiter.allow_at("HPA", 0));
        assert!(limiter.allow_at("HPA", 1));
        assert!(!limiter.allow_at("HPA", 2));
    }

    #[test]
    fn new_window_resets_counter() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.allow_at("PubChem", MINUTE - 1));
        assert!(!limiter.allow_at("PubChem", MINUTE - 1));
        assert!(limiter.allow_at("PubChem", MINUTE));
    }

    #[test]
    fn subjects_are_independent() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.allow_at("ChEMBL", 0));
        assert!(limiter.allow_at("UniProt", 0));
        assert!(!limiter.allow_at("ChEMBL", 0));
    }

    #[test]
    fn stale_windows_are_pruned() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 5);
        limiter.allow_at("a", 0);
        limiter.allow_at("b", 0);
        assert_eq!(limiter.tracked_windows(), 2);
        limiter.allow_at("a", 3 * MINUTE);
        assert_eq!(limiter.tracked_windows(), 1);
    }

    #[test]
    fn concurrent_increments_respect_limit() {
        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(60), 100));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..50).filter(|_| limiter.allow_at("x", 0)).count())
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100);
    }
}

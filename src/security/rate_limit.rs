//! Fixed-window rate limiting per client key.
//!
//! # Algorithm
//! One counter per client key within non-overlapping windows of fixed length.
//! A stale window is replaced wholesale, the counter incremented, then
//! compared against the cap; the whole sequence runs under a single per-key
//! lock, never across an await.
//!
//! # Known, accepted limitations
//! - Fixed windows admit up to 2x the cap in a burst straddling a window
//!   boundary. The sliding-window fix is deliberately not applied.
//! - Entries are never evicted; memory grows with client-key cardinality
//!   over the process lifetime.

use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-client-key window record.
#[derive(Debug, Clone, Copy)]
struct WindowEntry {
    count: u32,
    window_start: Instant,
}

/// Rejection carrying the retry-after hint, in whole seconds (rounded up,
/// never zero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("too many requests; retry after {retry_after_secs}s")]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
}

/// Fixed-window request counter gating requests per client identity.
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    entries: DashMap<String, WindowEntry>,
}

impl FixedWindowLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            entries: DashMap::new(),
        }
    }

    /// Count one request from `key` and decide whether it may proceed.
    ///
    /// The reset/increment/compare sequence holds the key's shard lock for
    /// its whole duration, so concurrent requests from the same key
    /// serialize their increments (no lost updates).
    pub fn check(&self, key: &str) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(WindowEntry {
                count: 0,
                window_start: now,
            });

        if now.duration_since(entry.window_start) >= self.window {
            *entry = WindowEntry {
                count: 0,
                window_start: now,
            };
        }

        entry.count += 1;

        if entry.count > self.max_requests {
            let remaining = self
                .window
                .saturating_sub(now.duration_since(entry.window_start));
            let retry_after_secs = (remaining.as_secs_f64().ceil() as u64).max(1);
            return Err(RateLimitExceeded { retry_after_secs });
        }

        Ok(())
    }

    /// Number of client keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_cap_then_rejects() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 5);
        for i in 0..5 {
            assert!(limiter.check("1.2.3.4").is_ok(), "request {i} within cap");
        }
        let rejection = limiter.check("1.2.3.4").unwrap_err();
        assert!(rejection.retry_after_secs >= 1);
        assert!(rejection.retry_after_secs <= 60);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("a").is_err());
        assert!(limiter.check("b").is_err());
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn window_expiry_resets_counter() {
        let limiter = FixedWindowLimiter::new(Duration::from_millis(50), 2);
        assert!(limiter.check("k").is_ok());
        assert!(limiter.check("k").is_ok());
        assert!(limiter.check("k").is_err());

        std::thread::sleep(Duration::from_millis(60));
        assert!(
            limiter.check("k").is_ok(),
            "counter must reset after the window elapses, despite prior rejections"
        );
    }

    #[test]
    fn concurrent_checks_lose_no_updates() {
        use std::sync::Arc;

        let limiter = Arc::new(FixedWindowLimiter::new(Duration::from_secs(60), 100));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = Arc::clone(&limiter);
            handles.push(std::thread::spawn(move || {
                let mut allowed = 0u32;
                for _ in 0..25 {
                    if limiter.check("shared").is_ok() {
                        allowed += 1;
                    }
                }
                allowed
            }));
        }
        let allowed: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100, "exactly the cap must be admitted, no more, no fewer");
    }
}

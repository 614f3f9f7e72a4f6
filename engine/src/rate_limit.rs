//! Submission rate limiting
//!
//! Sliding window of attempt timestamps per `origin|worker` key. Throttling
//! is reported as a retry-after signal, separate from validation errors.
//! Idle keys are swept from inside [`RateLimiter::check`], at most once per
//! window, so the map only holds keys seen in the last two windows.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;

/// Attempt rejected by the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAfter {
    /// Seconds until the oldest attempt in the window expires
    pub secs: u64,
}

/// Rate limiter for submission attempts
pub struct RateLimiter {
    /// Attempt timestamps (unix seconds) per key in the current window
    attempts: DashMap<String, Vec<u64>>,
    /// Window size in seconds
    window_seconds: u64,
    /// Max attempts per window
    max_attempts: u32,
    /// Unix time of the last sweep
    last_sweep: AtomicU64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            attempts: DashMap::new(),
            window_seconds: config.window_secs,
            max_attempts: config.max_attempts,
            last_sweep: AtomicU64::new(0),
        }
    }

    fn key(origin: &str, worker_id: &str) -> String {
        format!("{}|{}", origin, worker_id)
    }

    fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }

    /// Check if an attempt is allowed and record it
    pub fn check(&self, origin: &str, worker_id: &str) -> Result<(), RetryAfter> {
        self.check_at(origin, worker_id, Self::now())
    }

    /// Same as [`check`](Self::check) at an explicit unix time.
    pub fn check_at(&self, origin: &str, worker_id: &str, now: u64) -> Result<(), RetryAfter> {
        self.sweep_if_due(now);
        let cutoff = now.saturating_sub(self.window_seconds);

        let mut entry = self.attempts.entry(Self::key(origin, worker_id)).or_default();

        // Remove old attempts
        entry.retain(|&ts| ts > cutoff);

        if entry.len() >= self.max_attempts as usize {
            let oldest = entry.iter().copied().min().unwrap_or(now);
            let secs = (oldest + self.window_seconds).saturating_sub(now).max(1);
            warn!(
                origin = %origin,
                worker_id = %worker_id,
                retry_after = secs,
                "Submission rate limit exceeded"
            );
            return Err(RetryAfter { secs });
        }

        entry.push(now);
        Ok(())
    }

    fn sweep_if_due(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::Acquire);
        if now < last.saturating_add(self.window_seconds) {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let before = self.attempts.len();
            self.cleanup_at(now);
            debug!(
                dropped = before.saturating_sub(self.attempts.len()),
                "Swept idle rate limit keys"
            );
        }
    }

    /// Drop keys with no attempts left in the window
    pub fn cleanup_at(&self, now: u64) {
        let cutoff = now.saturating_sub(self.window_seconds);

        self.attempts.retain(|_, attempts| {
            attempts.retain(|&ts| ts > cutoff);
            !attempts.is_empty()
        });
    }

    pub fn cleanup(&self) {
        self.cleanup_at(Self::now())
    }

    /// Number of keys currently tracked
    pub fn tracked_keys(&self) -> usize {
        self.attempts.len()
    }
}

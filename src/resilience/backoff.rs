//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Bounded retry policy for transport-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Total physical attempts per fetch, including the first one.
    pub max_attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Draw each delay from `[base/2, base]` instead of using `base` exactly.
    pub jitter: bool,
    /// Non-2xx statuses that are retried inside the bounded loop.
    pub retry_on_status: Vec<u16>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            jitter: true,
            retry_on_status: Vec::new(),
        }
    }
}

impl BackoffPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_min_delay(mut self, delay: Duration) -> Self {
        self.min_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_retry_on_status(mut self, statuses: Vec<u16>) -> Self {
        self.retry_on_status = statuses;
        self
    }

    /// Deterministic delay after the `attempt`-th failure (1-based): min_delay * 2^(attempt-1), capped.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let min_ms = self.min_delay.as_millis().min(u64::MAX as u128) as u64;
        let cap_ms = self.max_delay.as_millis().min(u64::MAX as u128) as u64;
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        Duration::from_millis(min_ms.saturating_mul(factor).min(cap_ms))
    }

    /// Delay to actually sleep after the `attempt`-th failure.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        let base_ms = base.as_millis() as u64;
        let floor_ms = base_ms / 2;
        Duration::from_millis(rand::thread_rng().gen_range(floor_ms..=base_ms))
    }

    /// Whether another attempt is allowed after `attempt` attempts have failed.
    pub fn allows_another(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    pub fn retries_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_delay_doubles_then_caps() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_secs(1));
        assert_eq!(policy.base_delay(2), Duration::from_secs(2));
        assert_eq!(policy.base_delay(3), Duration::from_secs(3));
        assert_eq!(policy.base_delay(64), Duration::from_secs(3));
    }

    #[test]
    fn test_base_delay_is_monotonic() {
        let policy = BackoffPolicy::new()
            .with_min_delay(Duration::from_millis(250))
            .with_max_delay(Duration::from_secs(10));
        let mut previous = Duration::ZERO;
        for attempt in 1..20 {
            let d = policy.base_delay(attempt);
            assert!(d >= previous);
            assert!(d <= Duration::from_secs(10));
            previous = d;
        }
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = BackoffPolicy::default();
        for attempt in 1..=4 {
            let base = policy.base_delay(attempt);
            for _ in 0..50 {
                let d = policy.delay(attempt);
                assert!(d <= base);
                assert!(d >= base / 2);
            }
        }
    }

    #[test]
    fn test_without_jitter_is_exact() {
        let policy = BackoffPolicy::default().with_jitter(false);
        assert_eq!(policy.delay(2), Duration::from_secs(2));
    }

    #[test]
    fn test_attempt_cap() {
        let policy = BackoffPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.allows_another(1));

        let policy = BackoffPolicy::default();
        assert!(policy.allows_another(1));
        assert!(policy.allows_another(2));
        assert!(!policy.allows_another(3));
    }

    #[test]
    fn test_retry_on_status_opt_in() {
        let policy = BackoffPolicy::default();
        assert!(!policy.retries_status(503));
        let policy = policy.with_retry_on_status(vec![502, 503]);
        assert!(policy.retries_status(503));
        assert!(!policy.retries_status(404));
    }
}

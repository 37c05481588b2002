use crate::{Error, ErrorContext, Result};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// At most `max_calls` starts within any window of length `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateBudget {
    max_calls: u32,
    window: Duration,
}

impl RateBudget {
    pub fn new(max_calls: u32, window: Duration) -> Result<Self> {
        if max_calls == 0 {
            return Err(Error::configuration_with_context(
                "rate budget must allow at least one call",
                ErrorContext::new()
                    .with_field_path("max_calls")
                    .with_source("rate_budget"),
            ));
        }
        if window.is_zero() {
            return Err(Error::configuration_with_context(
                "rate window must be longer than zero",
                ErrorContext::new()
                    .with_field_path("window")
                    .with_source("rate_budget"),
            ));
        }
        Ok(Self { max_calls, window })
    }

    pub fn per_minute(max_calls: u32) -> Result<Self> {
        Self::new(max_calls, Duration::from_secs(60))
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Fallback hold when `now + after` does not fit an `Instant`.
const MAX_BLOCK: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct RateLimiterSnapshot {
    pub max_calls: u32,
    pub window: Duration,
    /// Calls started within the current window.
    pub in_window: usize,
    /// Estimated wait until the next call may start, if one is needed now.
    pub estimated_wait: Option<Duration>,
}

/// Outcome of a non-blocking acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Granted,
    /// No capacity yet; ask again after this long.
    Delayed(Duration),
}

#[derive(Debug)]
struct State {
    /// Start times of admitted calls, oldest first, all within the last window.
    starts: VecDeque<Instant>,
    /// Upstream asked everyone to hold off until this instant.
    blocked_until: Option<Instant>,
}

/// Sliding-window limiter shared by every fetcher clone.
///
/// - Never rejects: callers are told how long to wait instead
/// - Uses tokio's clock, so paused-time tests are deterministic
#[derive(Debug)]
pub struct RateLimiter {
    budget: RateBudget,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(budget: RateBudget) -> Self {
        Self {
            budget,
            state: Mutex::new(State {
                starts: VecDeque::with_capacity(budget.max_calls as usize),
                blocked_until: None,
            }),
        }
    }

    pub fn budget(&self) -> RateBudget {
        self.budget
    }

    fn prune_locked(budget: &RateBudget, st: &mut State, now: Instant) {
        while let Some(oldest) = st.starts.front() {
            if now.saturating_duration_since(*oldest) >= budget.window {
                st.starts.pop_front();
            } else {
                break;
            }
        }
    }

    fn admit_locked(budget: &RateBudget, st: &mut State, now: Instant) -> Admission {
        if let Some(until) = st.blocked_until {
            if until > now {
                return Admission::Delayed(until - now);
            }
            st.blocked_until = None;
        }

        Self::prune_locked(budget, st, now);

        if st.starts.len() < budget.max_calls as usize {
            st.starts.push_back(now);
            return Admission::Granted;
        }

        // Full: the slot frees when the oldest start leaves the window.
        let oldest = st.starts.front().copied().unwrap_or(now);
        Admission::Delayed((oldest + budget.window).saturating_duration_since(now))
    }

    /// Take a slot if one is free, otherwise report the remaining wait.
    pub async fn try_acquire(&self) -> Admission {
        let mut st = self.state.lock().await;
        Self::admit_locked(&self.budget, &mut st, Instant::now())
    }

    /// Acquire one slot, sleeping as long as needed.
    pub async fn acquire(&self) {
        loop {
            match self.try_acquire().await {
                Admission::Granted => return,
                Admission::Delayed(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Hold every caller until `after` has elapsed (e.g. an upstream `Retry-After`).
    pub async fn block_for(&self, after: Duration) {
        let mut st = self.state.lock().await;
        let now = Instant::now();
        let until = now
            .checked_add(after)
            .or_else(|| now.checked_add(MAX_BLOCK))
            .unwrap_or(now);
        st.blocked_until = Some(match st.blocked_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    pub async fn snapshot(&self) -> RateLimiterSnapshot {
        let mut st = self.state.lock().await;
        let now = Instant::now();
        Self::prune_locked(&self.budget, &mut st, now);

        let mut wait = st
            .blocked_until
            .filter(|until| *until > now)
            .map(|until| until - now);

        if st.starts.len() >= self.budget.max_calls as usize {
            if let Some(oldest) = st.starts.front() {
                let local = (*oldest + self.budget.window).saturating_duration_since(now);
                wait = Some(wait.unwrap_or_default().max(local));
            }
        }

        RateLimiterSnapshot {
            max_calls: self.budget.max_calls,
            window: self.budget.window,
            in_window: st.starts.len(),
            estimated_wait: wait,
        }
    }
}

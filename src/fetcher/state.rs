//! Fetch state machine.
//!
//! ```text
//! Idle ──granted──▶ Attempting ──2xx + envelope──▶ Succeeded
//!  ▲  └─delayed─▶ RateLimitWait          │
//!  │                    │                ├──429──▶ ThrottleWait ──▶ Idle (counter reset)
//!  └────────────────────┘                ├──transport error / retry status──▶ FailedTransient
//!                                        └──other status / bad envelope──▶ FailedFatal
//! FailedTransient ──attempts left──▶ (backoff) Idle
//! FailedTransient ──exhausted──▶ terminal
//! ```
//!
//! The `429` loop has no cap; only the transport loop is bounded.

use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::transport::TransportError;
use crate::Error;

/// Where a call was suspended or working when it got cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    RateLimit,
    Request,
    Backoff,
    Throttle,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::RateLimit => "rate-limit wait",
            Phase::Request => "request",
            Phase::Backoff => "retry backoff",
            Phase::Throttle => "upstream throttle wait",
        })
    }
}

/// A failure the bounded retry loop may absorb.
#[derive(Debug)]
pub enum TransientFailure {
    Transport(TransportError),
    Status { status: u16, body: String },
}

impl TransientFailure {
    pub(crate) fn into_error(self, attempts: u32) -> Error {
        match self {
            TransientFailure::Transport(source) => Error::Transport { attempts, source },
            TransientFailure::Status { status, body } => Error::UpstreamHttp { status, body },
        }
    }
}

impl fmt::Display for TransientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientFailure::Transport(e) => write!(f, "{}", e),
            TransientFailure::Status { status, .. } => write!(f, "HTTP {}", status),
        }
    }
}

#[derive(Debug)]
pub enum FetchState {
    Idle,
    RateLimitWait(Duration),
    Attempting,
    /// Upstream-specified wait, before the safety margin.
    ThrottleWait(Duration),
    Succeeded(Value),
    FailedTransient(TransientFailure),
    FailedFatal(Error),
}

/// Data-free mirror of [`FetchState`], recorded in a [`StateTrail`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StateKind {
    Idle,
    RateLimitWait,
    Attempting,
    ThrottleWait,
    Succeeded,
    FailedTransient,
    FailedFatal,
}

impl FetchState {
    pub fn kind(&self) -> StateKind {
        match self {
            FetchState::Idle => StateKind::Idle,
            FetchState::RateLimitWait(_) => StateKind::RateLimitWait,
            FetchState::Attempting => StateKind::Attempting,
            FetchState::ThrottleWait(_) => StateKind::ThrottleWait,
            FetchState::Succeeded(_) => StateKind::Succeeded,
            FetchState::FailedTransient(_) => StateKind::FailedTransient,
            FetchState::FailedFatal(_) => StateKind::FailedFatal,
        }
    }
}

/// Most states a [`StateTrail`] keeps; older ones are counted, not stored.
pub const TRAIL_LIMIT: usize = 64;

/// Most recent states of a call, oldest first.
///
/// The `429` loop is unbounded, so only the last [`TRAIL_LIMIT`] states are
/// kept and the rest are counted in `dropped`.
#[derive(Debug, Clone, Default)]
pub struct StateTrail {
    states: VecDeque<StateKind>,
    dropped: u32,
}

impl StateTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: StateKind) {
        if self.states.len() == TRAIL_LIMIT {
            self.states.pop_front();
            self.dropped = self.dropped.saturating_add(1);
        }
        self.states.push_back(kind);
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Kept states and the number dropped from the front.
    pub fn into_parts(self) -> (Vec<StateKind>, u32) {
        (self.states.into(), self.dropped)
    }
}

/// Per-call retry bookkeeping; dropped when the call finishes.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Transport attempt within the current bounded loop (1-based once started).
    pub attempt: u32,
    /// Physical requests sent over the whole call.
    pub physical_attempts: u32,
    pub throttled: u32,
    pub rate_limit_waits: u32,
    pub total_wait: Duration,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_attempt(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
        self.physical_attempts = self.physical_attempts.saturating_add(1);
    }

    /// A `429` restarts the bounded loop from scratch.
    pub fn on_throttle(&mut self) {
        self.throttled = self.throttled.saturating_add(1);
        self.attempt = 0;
    }

    pub fn on_rate_limit_wait(&mut self) {
        self.rate_limit_waits = self.rate_limit_waits.saturating_add(1);
    }

    pub fn add_wait(&mut self, waited: Duration) {
        self.total_wait = self.total_wait.saturating_add(waited);
    }
}

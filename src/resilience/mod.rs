//! # Resilience Primitives Module
//!
//! The two mechanisms the fetcher composes around every physical request.
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`rate_limiter`] | Sliding-window limiter shared by all callers |
//! | [`backoff`] | Bounded exponential backoff with jitter for transport failures |
//!
//! ## Rate Limiter
//!
//! ```rust
//! use pl_squad::resilience::rate_limiter::{Admission, RateBudget, RateLimiter};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> pl_squad::Result<()> {
//! let limiter = RateLimiter::new(RateBudget::new(20, Duration::from_secs(60))?);
//!
//! match limiter.try_acquire().await {
//!     Admission::Granted => { /* send the request */ }
//!     Admission::Delayed(wait) => { /* sleep `wait` and ask again */ }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Backoff
//!
//! ```rust
//! use pl_squad::resilience::backoff::BackoffPolicy;
//! use std::time::Duration;
//!
//! let policy = BackoffPolicy::new()
//!     .with_max_attempts(3)
//!     .with_max_delay(Duration::from_secs(3));
//! assert_eq!(policy.base_delay(2), Duration::from_secs(2));
//! ```

pub mod backoff;
pub mod rate_limiter;

//! # pl-squad
//!
//! Resilient client for the API-Football sports-data API (via RapidAPI).
//!
//! ## Overview
//!
//! One primitive, [`ResilientFetcher::fetch`], turns "GET endpoint E with
//! params P" into the `response` payload of the upstream envelope while
//! absorbing three kinds of pressure:
//!
//! - **Local rate budget**: a shared [`RateLimiter`] admits at most N calls per
//!   window W; callers wait their turn instead of failing.
//! - **Transport failures**: connection errors and timeouts are retried a
//!   bounded number of times with jittered exponential backoff.
//! - **Upstream throttling**: `429 Too Many Requests` is waited out for as long
//!   as upstream asks (`Retry-After`), with no retry cap.
//!
//! Anything else (other non-2xx statuses, bodies without a `response` key)
//! surfaces immediately as a typed [`Error`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pl_squad::{FootballApiExt, Params, ResilientFetcher};
//!
//! #[tokio::main]
//! async fn main() -> pl_squad::Result<()> {
//!     // RAPIDAPI_KEY, API_RATE_MAX, API_RATE_WINDOW, ...
//!     let fetcher = ResilientFetcher::from_env()?;
//!
//!     let teams = fetcher
//!         .fetch("teams", &Params::new().with("league", 39).with("season", 2024))
//!         .await?;
//!     println!("{teams}");
//!
//!     let squad = fetcher.team_squad(42, None).await?;
//!     println!("{squad}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`fetcher`] | The resilient fetch loop, its builder and state machine |
//! | [`resilience`] | Rate limiter and backoff policy |
//! | [`transport`] | HTTP transport seam and reqwest implementation |
//! | [`config`] | Environment-driven configuration |
//! | [`endpoints`] | Typed API-Football lookups |

pub mod config;
pub mod endpoints;
pub mod fetcher;
pub mod resilience;
pub mod transport;

pub use config::FetcherConfig;
pub use endpoints::FootballApiExt;
pub use fetcher::{FetchStats, FetcherBuilder, ParamValue, Params, ResilientFetcher};
pub use resilience::backoff::BackoffPolicy;
pub use resilience::rate_limiter::{RateBudget, RateLimiter};
pub use tokio_util::sync::CancellationToken;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};

//! Resilient fetch primitive for the upstream JSON API.
//!
//! Public surface is one type, [`ResilientFetcher`], built with
//! [`FetcherBuilder`]. Implementation details are split into submodules under
//! `src/fetcher/`.

pub mod builder;
pub mod core;
mod envelope;
mod policy;
pub mod state;
pub mod types;

pub use builder::FetcherBuilder;
pub use self::core::ResilientFetcher;
pub use policy::MAX_RETRY_AFTER;
pub use state::{FetchState, Phase, RetryState, StateKind, StateTrail, TRAIL_LIMIT};
pub use types::{FetchStats, ParamValue, Params};

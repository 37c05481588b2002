use std::sync::Arc;
use std::time::Duration;

use crate::config::{self, FetcherConfig};
use crate::fetcher::core::ResilientFetcher;
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::rate_limiter::{RateBudget, RateLimiter};
use crate::transport::{HttpTransport, Transport};
use crate::{Error, Result};

/// Default pause added on top of limiter-reported waits.
pub const DEFAULT_RATE_LIMIT_MARGIN: Duration = Duration::from_millis(50);
/// Default pause added on top of an upstream `Retry-After`.
pub const DEFAULT_THROTTLE_MARGIN: Duration = Duration::from_millis(50);

/// Builder for [`ResilientFetcher`].
///
/// Only the API key is mandatory. Everything else defaults from
/// [`FetcherConfig`]; a limiter can be shared between fetchers by passing the
/// same `Arc` to each builder.
pub struct FetcherBuilder {
    config: Option<FetcherConfig>,
    api_key: Option<String>,
    base_url: Option<String>,
    budget: Option<RateBudget>,
    timeout: Option<Duration>,
    limiter: Option<Arc<RateLimiter>>,
    backoff: Option<BackoffPolicy>,
    transport: Option<Arc<dyn Transport>>,
    rate_limit_margin: Duration,
    throttle_margin: Duration,
}

impl FetcherBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            api_key: None,
            base_url: None,
            budget: None,
            timeout: None,
            limiter: None,
            backoff: None,
            transport: None,
            rate_limit_margin: DEFAULT_RATE_LIMIT_MARGIN,
            throttle_margin: DEFAULT_THROTTLE_MARGIN,
        }
    }

    /// Start from a loaded configuration; later calls override its fields.
    pub fn from_config(config: FetcherConfig) -> Self {
        let mut builder = Self::new();
        builder.config = Some(config);
        builder
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the `https://{host}/v3` base (mock servers, proxies).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn rate_budget(mut self, budget: RateBudget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Share an existing limiter. Takes precedence over [`Self::rate_budget`].
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn backoff(mut self, policy: BackoffPolicy) -> Self {
        self.backoff = Some(policy);
        self
    }

    /// Replace the HTTP transport (test doubles, instrumented clients).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn rate_limit_margin(mut self, margin: Duration) -> Self {
        self.rate_limit_margin = margin;
        self
    }

    pub fn throttle_margin(mut self, margin: Duration) -> Self {
        self.throttle_margin = margin;
        self
    }

    /// Build the fetcher. Fails with [`Error::CredentialMissing`] before any
    /// network activity when no API key was supplied.
    pub fn build(self) -> Result<ResilientFetcher> {
        let mut config = match (self.config, self.api_key) {
            (Some(mut cfg), Some(key)) => {
                if key.trim().is_empty() {
                    return Err(Error::credential_missing(config::ENV_API_KEY));
                }
                cfg.api_key = key;
                cfg
            }
            (Some(cfg), None) => cfg,
            (None, Some(key)) => FetcherConfig::new(key)?,
            (None, None) => return Err(Error::credential_missing(config::ENV_API_KEY)),
        };

        if let Some(raw) = self.base_url {
            config.base_url = config::parse_base_url(&raw, "base_url")?;
        }
        if let Some(budget) = self.budget {
            config.budget = budget;
        }
        if let Some(timeout) = self.timeout {
            config.timeout = timeout;
        }

        let backoff = self
            .backoff
            .unwrap_or_else(|| BackoffPolicy::default().with_max_attempts(config.max_attempts));

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => Arc::new(HttpTransport::new(&config)?),
        };

        let limiter = self
            .limiter
            .unwrap_or_else(|| Arc::new(RateLimiter::new(config.budget)));

        Ok(ResilientFetcher {
            transport,
            limiter,
            backoff,
            base_url: config.base_url,
            rate_limit_margin: self.rate_limit_margin,
            throttle_margin: self.throttle_margin,
        })
    }
}

impl Default for FetcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

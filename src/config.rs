//! Environment-driven configuration.
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | `RAPIDAPI_KEY` | required | API credential sent as `x-rapidapi-key` |
//! | `API_RATE_MAX` | 20 | calls allowed per window |
//! | `API_RATE_WINDOW` | 60 | window length in seconds |
//! | `API_TIMEOUT_SECS` | 15 | per-attempt HTTP timeout |
//! | `API_MAX_ATTEMPTS` | 3 | transport attempts per fetch |
//! | `API_BASE_URL` | `https://{host}/v3` | base URL override |

use crate::resilience::rate_limiter::RateBudget;
use crate::{Error, ErrorContext, Result};
use std::time::Duration;
use url::Url;

pub const ENV_API_KEY: &str = "RAPIDAPI_KEY";
pub const ENV_RATE_MAX: &str = "API_RATE_MAX";
pub const ENV_RATE_WINDOW: &str = "API_RATE_WINDOW";
pub const ENV_TIMEOUT_SECS: &str = "API_TIMEOUT_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "API_MAX_ATTEMPTS";
pub const ENV_BASE_URL: &str = "API_BASE_URL";

pub const DEFAULT_API_HOST: &str = "api-football-v1.p.rapidapi.com";
pub const DEFAULT_RATE_MAX: u32 = 20;
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct FetcherConfig {
    pub api_key: String,
    pub api_host: String,
    pub base_url: Url,
    pub timeout: Duration,
    pub budget: RateBudget,
    pub max_attempts: u32,
}

impl std::fmt::Debug for FetcherConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetcherConfig")
            .field("api_key", &"<redacted>")
            .field("api_host", &self.api_host)
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("budget", &self.budget)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl FetcherConfig {
    /// Config with defaults for everything except the credential.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::credential_missing(ENV_API_KEY));
        }
        Ok(Self {
            api_key,
            api_host: DEFAULT_API_HOST.to_string(),
            base_url: default_base_url(DEFAULT_API_HOST)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            budget: RateBudget::new(
                DEFAULT_RATE_MAX,
                Duration::from_secs(DEFAULT_RATE_WINDOW_SECS),
            )?,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Read the process environment. Call `dotenvy::dotenv()` first to honour a `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(ENV_API_KEY)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::credential_missing(ENV_API_KEY))?;

        let mut config = Self::new(api_key)?;

        let max_calls = parse_positive(&lookup, ENV_RATE_MAX, DEFAULT_RATE_MAX as u64)?;
        let max_calls = u32::try_from(max_calls).map_err(|_| {
            Error::configuration_with_context(
                "value does not fit in 32 bits",
                ErrorContext::new()
                    .with_field_path(ENV_RATE_MAX)
                    .with_source("config_loader"),
            )
        })?;
        let window = parse_positive(&lookup, ENV_RATE_WINDOW, DEFAULT_RATE_WINDOW_SECS)?;
        config.budget = RateBudget::new(max_calls, Duration::from_secs(window))?;

        let timeout = parse_positive(&lookup, ENV_TIMEOUT_SECS, DEFAULT_TIMEOUT_SECS)?;
        config.timeout = Duration::from_secs(timeout);

        let attempts = parse_positive(&lookup, ENV_MAX_ATTEMPTS, DEFAULT_MAX_ATTEMPTS as u64)?;
        config.max_attempts = attempts.min(u32::MAX as u64) as u32;

        if let Some(raw) = lookup(ENV_BASE_URL).filter(|s| !s.trim().is_empty()) {
            config.base_url = parse_base_url(raw.trim(), ENV_BASE_URL)?;
        }

        Ok(config)
    }
}

pub(crate) fn default_base_url(host: &str) -> Result<Url> {
    parse_base_url(&format!("https://{}/v3", host), "api_host")
}

pub(crate) fn parse_base_url(raw: &str, field: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| {
        Error::configuration_with_context(
            format!("invalid base URL: {}", e),
            ErrorContext::new()
                .with_field_path(field)
                .with_details(raw.to_string())
                .with_source("config_loader"),
        )
    })?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(Error::configuration_with_context(
            "base URL must be an absolute http(s) URL",
            ErrorContext::new()
                .with_field_path(field)
                .with_details(raw.to_string())
                .with_source("config_loader"),
        ));
    }
    Ok(url)
}

fn parse_positive<F>(lookup: &F, name: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::configuration_with_context(
            "must be a positive integer",
            ErrorContext::new()
                .with_field_path(name)
                .with_details(format!("got {:?}", raw))
                .with_source("config_loader"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = FetcherConfig::from_lookup(lookup(&[(ENV_API_KEY, "secret")])).unwrap();
        assert_eq!(cfg.api_key, "secret");
        assert_eq!(cfg.budget.max_calls(), 20);
        assert_eq!(cfg.budget.window(), Duration::from_secs(60));
        assert_eq!(cfg.timeout, Duration::from_secs(15));
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(
            cfg.base_url.as_str(),
            "https://api-football-v1.p.rapidapi.com/v3"
        );
    }

    #[test]
    fn test_missing_credential() {
        let err = FetcherConfig::from_lookup(lookup(&[(ENV_RATE_MAX, "5")])).unwrap_err();
        assert!(matches!(err, Error::CredentialMissing { ref var } if var == ENV_API_KEY));
    }

    #[test]
    fn test_blank_credential_counts_as_missing() {
        let err = FetcherConfig::from_lookup(lookup(&[(ENV_API_KEY, "   ")])).unwrap_err();
        assert!(matches!(err, Error::CredentialMissing { .. }));
        assert!(matches!(
            FetcherConfig::new(""),
            Err(Error::CredentialMissing { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let cfg = FetcherConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "k"),
            (ENV_RATE_MAX, "30"),
            (ENV_RATE_WINDOW, "10"),
            (ENV_TIMEOUT_SECS, "5"),
            (ENV_MAX_ATTEMPTS, "5"),
            (ENV_BASE_URL, "http://127.0.0.1:8080/v3"),
        ]))
        .unwrap();
        assert_eq!(cfg.budget.max_calls(), 30);
        assert_eq!(cfg.budget.window(), Duration::from_secs(10));
        assert_eq!(cfg.timeout, Duration::from_secs(5));
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.base_url.as_str(), "http://127.0.0.1:8080/v3");
    }

    #[test]
    fn test_rejects_non_positive_budget() {
        for bad in ["0", "-3", "twenty", ""] {
            let err = FetcherConfig::from_lookup(lookup(&[(ENV_API_KEY, "k"), (ENV_RATE_MAX, bad)]))
                .unwrap_err();
            let ctx = err.context().expect("configuration error carries context");
            assert_eq!(ctx.field_path.as_deref(), Some(ENV_RATE_MAX));
        }
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let err = FetcherConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "k"),
            (ENV_BASE_URL, "mailto:someone@example.com"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_debug_redacts_key() {
        let cfg = FetcherConfig::new("super-secret").unwrap();
        let dbg = format!("{:?}", cfg);
        assert!(!dbg.contains("super-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}

//! The fetch loop.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use super::envelope;
use super::policy::{self, StatusClass};
use super::state::{FetchState, Phase, RetryState, StateTrail, TransientFailure};
use super::types::{FetchStats, Params};
use crate::config::FetcherConfig;
use crate::fetcher::builder::FetcherBuilder;
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::rate_limiter::{Admission, RateLimiter, RateLimiterSnapshot};
use crate::transport::Transport;
use crate::{Error, ErrorContext, Result};

/// Rate-limited, retrying GET-JSON client.
///
/// Cheap to clone; clones share the transport and the rate limiter, so the
/// budget holds across every clone and every concurrent call.
#[derive(Clone)]
pub struct ResilientFetcher {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) limiter: Arc<RateLimiter>,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) base_url: Url,
    pub(crate) rate_limit_margin: Duration,
    pub(crate) throttle_margin: Duration,
}

impl std::fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("base_url", &self.base_url.as_str())
            .field("budget", &self.limiter.budget())
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl ResilientFetcher {
    pub fn builder() -> FetcherBuilder {
        FetcherBuilder::new()
    }

    /// Fetcher configured from the process environment.
    pub fn from_env() -> Result<Self> {
        FetcherBuilder::from_config(FetcherConfig::from_env()?).build()
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn signals(&self) -> RateLimiterSnapshot {
        self.limiter.snapshot().await
    }

    /// GET `endpoint` with `params` and return the envelope's `response` value.
    pub async fn fetch(&self, endpoint: &str, params: &Params) -> Result<Value> {
        self.fetch_with_cancel(endpoint, params, &CancellationToken::new())
            .await
    }

    /// Like [`Self::fetch`], but gives up with [`Error::Cancelled`] once `cancel` fires.
    pub async fn fetch_with_cancel(
        &self,
        endpoint: &str,
        params: &Params,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        self.fetch_with_stats(endpoint, params, cancel)
            .await
            .map(|(value, _)| value)
    }

    pub async fn fetch_with_stats(
        &self,
        endpoint: &str,
        params: &Params,
        cancel: &CancellationToken,
    ) -> Result<(Value, FetchStats)> {
        let url = self.endpoint_url(endpoint)?;
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!("fetch", endpoint = %url.path(), request_id = %request_id);
        self.drive(url, params, cancel, request_id)
            .instrument(span)
            .await
    }

    /// `{base}/{endpoint}` with leading slashes stripped from the endpoint.
    pub(crate) fn endpoint_url(&self, endpoint: &str) -> Result<Url> {
        let relative = endpoint.trim().trim_start_matches('/');
        if relative.is_empty() {
            return Err(Error::validation_with_context(
                "endpoint must not be empty",
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_details(format!("got {:?}", endpoint))
                    .with_source("fetcher"),
            ));
        }
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            relative
        );
        Url::parse(&joined).map_err(|e| {
            Error::validation_with_context(
                format!("endpoint does not form a valid URL: {}", e),
                ErrorContext::new()
                    .with_field_path("endpoint")
                    .with_details(joined.clone())
                    .with_source("fetcher"),
            )
        })
    }

    async fn drive(
        &self,
        url: Url,
        params: &Params,
        cancel: &CancellationToken,
        request_id: String,
    ) -> Result<(Value, FetchStats)> {
        let query = params.to_query();
        let start = Instant::now();
        let mut retry = RetryState::new();
        let mut trail = StateTrail::new();
        let mut state = FetchState::Idle;

        loop {
            trail.push(state.kind());
            state = match state {
                FetchState::Idle => match self.limiter.try_acquire().await {
                    Admission::Granted => FetchState::Attempting,
                    Admission::Delayed(wait) => FetchState::RateLimitWait(wait),
                },

                FetchState::RateLimitWait(wait) => {
                    let sleep_for = wait.saturating_add(self.rate_limit_margin);
                    warn!(
                        wait_ms = sleep_for.as_millis() as u64,
                        "Rate limit reached, sleeping"
                    );
                    retry.on_rate_limit_wait();
                    self.pause(sleep_for, Phase::RateLimit, cancel, &mut retry)
                        .await?;
                    FetchState::Idle
                }

                FetchState::Attempting => {
                    retry.begin_attempt();
                    debug!(
                        attempt = retry.attempt,
                        physical_attempt = retry.physical_attempts,
                        params = query.len(),
                        "sending request"
                    );
                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            return Err(Error::Cancelled { phase: Phase::Request });
                        }
                        r = self.transport.get(&url, &query) => r,
                    };
                    match sent {
                        Err(e) => FetchState::FailedTransient(TransientFailure::Transport(e)),
                        Ok(resp) => match policy::classify(&resp, &self.backoff) {
                            StatusClass::Success => match envelope::extract(&resp.body) {
                                Ok(value) => FetchState::Succeeded(value),
                                Err(e) => FetchState::FailedFatal(e),
                            },
                            StatusClass::Throttled(after) => FetchState::ThrottleWait(after),
                            StatusClass::Retryable => {
                                FetchState::FailedTransient(TransientFailure::Status {
                                    status: resp.status,
                                    body: policy::body_preview(&resp.body),
                                })
                            }
                            StatusClass::Fatal => FetchState::FailedFatal(Error::UpstreamHttp {
                                status: resp.status,
                                body: policy::body_preview(&resp.body),
                            }),
                        },
                    }
                }

                FetchState::ThrottleWait(after) => {
                    let sleep_for = after.saturating_add(self.throttle_margin);
                    warn!(
                        retry_after_ms = after.as_millis() as u64,
                        throttled = retry.throttled + 1,
                        "Upstream returned 429, waiting before retrying"
                    );
                    self.limiter.block_for(after).await;
                    retry.on_throttle();
                    self.pause(sleep_for, Phase::Throttle, cancel, &mut retry)
                        .await?;
                    FetchState::Idle
                }

                FetchState::FailedTransient(failure) => {
                    if self.backoff.allows_another(retry.attempt) {
                        let delay = self.backoff.delay(retry.attempt);
                        info!(
                            attempt = retry.attempt,
                            max_attempts = self.backoff.max_attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %failure,
                            "transient failure, backing off"
                        );
                        self.pause(delay, Phase::Backoff, cancel, &mut retry).await?;
                        FetchState::Idle
                    } else {
                        info!(
                            attempts = retry.attempt,
                            duration_ms = start.elapsed().as_millis() as u64,
                            error = %failure,
                            "giving up after transient failures"
                        );
                        return Err(failure.into_error(retry.attempt));
                    }
                }

                FetchState::Succeeded(value) => {
                    let (trail, trail_dropped) = trail.into_parts();
                    let stats = FetchStats {
                        request_id,
                        endpoint: url.path().to_string(),
                        attempts: retry.physical_attempts,
                        throttled: retry.throttled,
                        rate_limit_waits: retry.rate_limit_waits,
                        total_wait_ms: retry.total_wait.as_millis() as u64,
                        duration_ms: start.elapsed().as_millis() as u64,
                        trail,
                        trail_dropped,
                    };
                    debug!(
                        attempts = stats.attempts,
                        duration_ms = stats.duration_ms,
                        "fetch succeeded"
                    );
                    return Ok((value, stats));
                }

                FetchState::FailedFatal(e) => {
                    info!(
                        attempts = retry.physical_attempts,
                        duration_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "fetch failed"
                    );
                    return Err(e);
                }
            };
        }
    }

    /// Sleep unless cancelled first.
    async fn pause(
        &self,
        wait: Duration,
        phase: Phase,
        cancel: &CancellationToken,
        retry: &mut RetryState,
    ) -> Result<()> {
        let started = Instant::now();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                retry.add_wait(started.elapsed());
                Err(Error::Cancelled { phase })
            }
            _ = tokio::time::sleep(wait) => {
                retry.add_wait(wait);
                Ok(())
            }
        }
    }
}

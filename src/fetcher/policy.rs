//! Status classification and `Retry-After` handling.

use std::time::Duration;

use crate::resilience::backoff::BackoffPolicy;
use crate::transport::RawResponse;

pub(crate) const TOO_MANY_REQUESTS: u16 = 429;

/// Used when a `429` arrives without a usable `Retry-After`.
pub(crate) const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Longest `Retry-After` honoured as-is; larger values are clamped to it.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Upper bound on how much of an error body ends up in an error message.
const BODY_PREVIEW_CHARS: usize = 512;

/// What a response that reached us means for the fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StatusClass {
    Success,
    /// Upstream asked us to wait this long.
    Throttled(Duration),
    /// Retry inside the bounded loop.
    Retryable,
    Fatal,
}

pub(crate) fn classify(resp: &RawResponse, backoff: &BackoffPolicy) -> StatusClass {
    if resp.is_success() {
        StatusClass::Success
    } else if resp.status == TOO_MANY_REQUESTS {
        StatusClass::Throttled(retry_after(resp).unwrap_or(DEFAULT_RETRY_AFTER))
    } else if backoff.retries_status(resp.status) {
        StatusClass::Retryable
    } else {
        StatusClass::Fatal
    }
}

/// Parse `Retry-After: <seconds>`, clamped to [`MAX_RETRY_AFTER`].
/// The HTTP-date form is not supported.
pub(crate) fn retry_after(resp: &RawResponse) -> Option<Duration> {
    let raw = resp.header("retry-after")?;
    let wait = match raw.parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(_) => {
            let secs = raw.parse::<f64>().ok().filter(|s| *s >= 0.0)?;
            // Too large (or infinite) for a Duration.
            Duration::try_from_secs_f64(secs).unwrap_or(MAX_RETRY_AFTER)
        }
    };
    Some(wait.min(MAX_RETRY_AFTER))
}

pub(crate) fn body_preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let mut chars = text.chars();
    let preview: String = chars.by_ref().take(BODY_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}…", preview)
    } else {
        preview
    }
}

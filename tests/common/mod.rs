//! Scripted transport double for deterministic fetcher tests.
//!
//! Pair it with `#[tokio::test(start_paused = true)]`: every sleep in the
//! fetcher then completes instantly while the tokio clock advances exactly.

#![allow(dead_code)]

use async_trait::async_trait;
use pl_squad::transport::{RawResponse, Transport, TransportError};
use pl_squad::{BackoffPolicy, FetcherBuilder, RateBudget, ResilientFetcher};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use url::Url;

pub type Scripted = Result<RawResponse, TransportError>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub url: String,
    pub query: Vec<(String, String)>,
}

/// Plays back queued outcomes, then repeats `fallback` forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    fallback: Mutex<RawResponse>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new(fallback: RawResponse) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn with_script(script: Vec<Scripted>, fallback: RawResponse) -> Arc<Self> {
        let t = Self::new(fallback);
        t.script.lock().unwrap().extend(script);
        t
    }

    pub fn set_fallback(&self, resp: RawResponse) {
        *self.fallback.lock().unwrap() = resp;
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &Url, query: &[(String, String)]) -> Scripted {
        self.calls.lock().unwrap().push(RecordedCall {
            at: Instant::now(),
            url: url.to_string(),
            query: query.to_vec(),
        });
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(outcome) => outcome,
            None => Ok(self.fallback.lock().unwrap().clone()),
        }
    }
}

pub fn ok_json(body: &str) -> RawResponse {
    RawResponse::new(200, body.to_string()).with_header("content-type", "application/json")
}

pub fn ok_response() -> RawResponse {
    ok_json(r#"{"response":[{"id":1}]}"#)
}

pub fn throttled(retry_after: Option<&str>) -> RawResponse {
    let resp = RawResponse::new(429, r#"{"message":"Too many requests"}"#);
    match retry_after {
        Some(v) => resp.with_header("retry-after", v),
        None => resp,
    }
}

pub fn timeout() -> Scripted {
    Err(TransportError::Timeout)
}

pub fn refused() -> Scripted {
    Err(TransportError::Connect("connection refused".into()))
}

/// Fetcher over `transport` with a roomy budget and deterministic backoff.
pub fn builder(transport: Arc<ScriptedTransport>) -> FetcherBuilder {
    FetcherBuilder::new()
        .api_key("test-key")
        .transport(transport)
        .rate_budget(RateBudget::new(1_000, Duration::from_secs(60)).unwrap())
        .backoff(BackoffPolicy::default().with_jitter(false))
}

pub fn fetcher(transport: Arc<ScriptedTransport>) -> ResilientFetcher {
    builder(transport).build().unwrap()
}

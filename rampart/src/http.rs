//! Instrumented request entry point.
//!
//! The HTTP client itself is an injected capability: anything implementing
//! [`HttpClient`] can be driven through [`get`], which times the call and
//! records the built-in request metrics through the runner's ambient hook.
//! Timeouts and retries are the client's business, not ours.

use crate::runner::RUNNER_HOOK;
use rampart_core::{Tags, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
#[allow(unused_imports)]
use tracing::{debug, error, trace, warn};

#[derive(Debug, Clone)]
pub struct Timings {
    /// Total request time as measured by the client.
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
    pub timings: Timings,
}

impl Response {
    /// Whether the request counts as successful: any 2xx or 3xx status.
    pub fn ok(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("transport error: {0}")]
    Transport(String),
}

impl HttpError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }
}

/// The one operation this harness needs from an HTTP stack.
pub trait HttpClient: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<Response, HttpError>> + Send;
}

/// Issues a GET through `client` and records `http_req_duration`,
/// `http_req_failed`, and `http_reqs` for it, then passes the result
/// through untouched.
///
/// Duration comes from the client's own timings; for transport errors
/// (which have none) the wall-clock wait is recorded instead. A transport
/// error or a status outside 200-399 counts as a failed request, but
/// non-2xx responses are still returned so checks can inspect them.
pub async fn get<C: HttpClient>(client: &C, url: &str) -> Result<Response, HttpError> {
    let start = Instant::now();
    let res = client.get(url).await;
    let elapsed = start.elapsed();

    let recorded = RUNNER_HOOK.try_with(|hook| {
        let recorder = &hook.recorder;
        match &res {
            Ok(response) => {
                let tags: Tags = vec![
                    ("url".to_string(), url.to_string()),
                    ("status".to_string(), response.status.to_string()),
                ];
                recorder.sample(
                    HTTP_REQ_DURATION,
                    response.timings.duration.as_secs_f64() * 1_000.,
                    tags,
                );
                recorder.sample(
                    HTTP_REQ_FAILED,
                    if response.ok() { 0. } else { 1. },
                    Vec::new(),
                );
            }
            Err(err) => {
                warn!("request to {url} failed: {err}");
                let tags: Tags = vec![("url".to_string(), url.to_string())];
                recorder.sample(HTTP_REQ_DURATION, elapsed.as_secs_f64() * 1_000., tags);
                recorder.sample(HTTP_REQ_FAILED, 1., Vec::new());
            }
        }
        recorder.increment(HTTP_REQS, 1);
    });

    if recorded.is_err() {
        error!("http::get() called outside a running scenario; metrics not recorded");
    }

    res
}

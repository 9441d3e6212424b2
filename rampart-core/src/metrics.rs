//! Built-in metric names.
//!
//! Duration metrics are recorded in milliseconds. Thresholds reference
//! these names directly (e.g. `http_req_duration: p(95)<500`).

/// Wall-clock latency of an instrumented request, in milliseconds.
pub const HTTP_REQ_DURATION: &str = "http_req_duration";

/// Rate of requests that errored or returned a non-2xx/3xx status.
pub const HTTP_REQ_FAILED: &str = "http_req_failed";

/// Total instrumented requests issued.
pub const HTTP_REQS: &str = "http_reqs";

/// Pass rate across every check recorded during the run.
pub const CHECKS: &str = "checks";

/// Total scenario iterations completed (including failed ones).
pub const ITERATIONS: &str = "iterations";

/// Wall-clock time of one scenario iteration, in milliseconds.
pub const ITERATION_DURATION: &str = "iteration_duration";

/// Active virtual users, sampled once per control tick.
pub const VUS: &str = "vus";

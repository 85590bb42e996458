// crates/loadstone-engine/src/engine.rs
// ============================================================================
// Module: Load Execution Engine
// Description: Worker pool, per-request timing, and aggregate construction.
// Purpose: Drive one run against its target and return the terminal result.
// Dependencies: loadstone-core, reqwest, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`execute`] builds one blocking HTTP client for the run, spawns one
//! worker thread per virtual user, and collects per-response samples into
//! the shared accumulator. Workers are symmetric: in budget mode each issues
//! `floor(R / U)` requests, so the effective total may fall short of R by up
//! to U - 1. Requests read response headers only; draining the body would
//! charge transfer time the caller did not ask about.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use loadstone_core::HttpMethod;
use loadstone_core::MetricSample;
use loadstone_core::RunAggregate;
use loadstone_core::RunToken;
use loadstone_core::StatusAggregate;
use loadstone_core::stats;
use loadstone_core::unix_millis;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::header::HeaderMap;
use reqwest::header::HeaderName;
use reqwest::header::HeaderValue;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::accumulator::PeakRps;
use crate::accumulator::RpsWindow;
use crate::accumulator::Sample;
use crate::accumulator::SampleLog;
use crate::cancel::CancelToken;
use crate::observer::SampleObserver;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default per-request timeout in milliseconds. A timeout is a transport
/// failure and records a status-503 sample.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Request budget applied when a run specifies neither budget nor duration.
pub const DEFAULT_REQUEST_BUDGET: u64 = 100;

/// Every n-th snapshot is handed to [`SampleObserver::persist`].
const PERSIST_EVERY: u64 = 10;

/// Status code recorded for transport-level failures.
const TRANSPORT_FAILURE_STATUS: u16 = 503;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal engine errors not attributable to a single request.
///
/// # Invariants
/// - Per-request transport failures never surface here; they become
///   status-503 samples.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),
    /// A configured header name or value is not representable.
    #[error("invalid header {name}: {reason}")]
    InvalidHeader {
        /// Offending header name.
        name: String,
        /// Parse failure description.
        reason: String,
    },
    /// A worker thread could not be spawned.
    #[error("worker spawn failed: {0}")]
    WorkerSpawn(String),
    /// A worker thread panicked.
    #[error("worker thread panicked")]
    WorkerPanic,
}

// ============================================================================
// SECTION: Plan
// ============================================================================

/// Stop criterion for a run. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCriterion {
    /// Total request budget split across workers.
    Budget(u64),
    /// Wall-clock duration.
    Duration(Duration),
}

impl StopCriterion {
    /// Derives the criterion from captured run settings, falling back to the
    /// default budget when neither is set.
    #[must_use]
    pub fn from_settings(requests: Option<u64>, duration_secs: Option<u64>) -> Self {
        match (requests, duration_secs) {
            (_, Some(secs)) => Self::Duration(Duration::from_secs(secs)),
            (Some(budget), None) => Self::Budget(budget),
            (None, None) => Self::Budget(DEFAULT_REQUEST_BUDGET),
        }
    }
}

/// Bearer header produced by the token-fetch preflight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerHeader {
    /// Header name to inject.
    pub name: String,
    /// Prefixed header value.
    pub value: String,
}

/// Everything the engine needs to drive one run.
#[derive(Debug, Clone)]
pub struct EnginePlan {
    /// Run token stamped into every sample.
    pub run_token: RunToken,
    /// Target URL.
    pub url: String,
    /// Target HTTP method.
    pub method: HttpMethod,
    /// Virtual user count (worker threads).
    pub users: u32,
    /// Stop criterion.
    pub stop: StopCriterion,
    /// Optional per-request headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Optional request body.
    pub body: Option<String>,
    /// Content type for the request body.
    pub content_type: String,
    /// Skip TLS certificate verification when set.
    pub insecure_tls: bool,
    /// Optional bearer header from the auth preflight.
    pub bearer: Option<BearerHeader>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
}

/// Result of a finished (or cancelled) engine run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineOutcome {
    /// Terminal aggregate over all recorded samples.
    pub aggregate: RunAggregate,
    /// True when the run stopped on cancellation.
    pub cancelled: bool,
}

// ============================================================================
// SECTION: Shared State
// ============================================================================

/// State shared by all workers of one run.
struct EngineShared {
    /// Shared HTTP client.
    client: Client,
    /// Run token stamped into samples.
    run_token: RunToken,
    /// Target URL.
    url: String,
    /// Target method.
    method: reqwest::Method,
    /// Prebuilt header map applied to every request.
    headers: HeaderMap,
    /// Optional request body.
    body: Option<String>,
    /// Append-only sample log.
    log: SampleLog,
    /// Monotonic request sequence; also drives persistence sampling.
    sequence: AtomicU64,
    /// Running successful request count.
    successes: AtomicU64,
    /// Running failed request count.
    failures: AtomicU64,
    /// Running latency sum in milliseconds.
    latency_sum_ms: AtomicU64,
    /// Sliding one-second RPS window.
    window: RpsWindow,
    /// Peak windowed RPS.
    peak: PeakRps,
}

// ============================================================================
// SECTION: Execution
// ============================================================================

/// Executes one run to completion or cancellation.
///
/// Returns after every worker has exited; the caller may record the terminal
/// status as soon as this returns.
///
/// # Errors
///
/// Returns [`EngineError`] when the client or headers cannot be built, a
/// worker cannot be spawned, or a worker panics.
pub fn execute(
    plan: &EnginePlan,
    cancel: &CancelToken,
    observer: Arc<dyn SampleObserver>,
) -> Result<EngineOutcome, EngineError> {
    let client = build_client(plan)?;
    let headers = build_headers(plan)?;
    let shared = Arc::new(EngineShared {
        client,
        run_token: plan.run_token.clone(),
        url: plan.url.clone(),
        method: to_reqwest_method(plan.method),
        headers,
        body: plan.body.clone(),
        log: SampleLog::new(),
        sequence: AtomicU64::new(0),
        successes: AtomicU64::new(0),
        failures: AtomicU64::new(0),
        latency_sum_ms: AtomicU64::new(0),
        window: RpsWindow::new(),
        peak: PeakRps::new(),
    });

    let users = plan.users.max(1);
    let mode = match plan.stop {
        StopCriterion::Budget(total) => WorkerMode::Budget {
            per_worker: total / u64::from(users),
        },
        StopCriterion::Duration(duration) => WorkerMode::Deadline {
            deadline: Instant::now() + duration,
        },
    };
    if let WorkerMode::Budget {
        per_worker: 0,
    } = mode
    {
        warn!(users, "request budget below user count, no requests will be issued");
    }

    let started = Instant::now();
    let mut handles = Vec::with_capacity(users as usize);
    for index in 0 .. users {
        let shared = Arc::clone(&shared);
        let cancel = cancel.clone();
        let observer = Arc::clone(&observer);
        let handle = thread::Builder::new()
            .name(format!("loadstone-worker-{index}"))
            .spawn(move || run_worker(&shared, &cancel, observer.as_ref(), mode))
            .map_err(|err| EngineError::WorkerSpawn(err.to_string()))?;
        handles.push(handle);
    }

    let mut panicked = false;
    for handle in handles {
        if handle.join().is_err() {
            // Stop the remaining workers before reporting the fatal error.
            cancel.cancel();
            panicked = true;
        }
    }
    if panicked {
        return Err(EngineError::WorkerPanic);
    }

    let elapsed_ms =
        u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let samples = shared.log.drain();
    debug!(
        run_token = %shared.run_token,
        samples = samples.len(),
        elapsed_ms,
        "engine drained worker pool"
    );
    Ok(EngineOutcome {
        aggregate: build_aggregate(&shared, &samples, elapsed_ms),
        cancelled: cancel.is_cancelled(),
    })
}

/// Per-worker stop condition.
#[derive(Debug, Clone, Copy)]
enum WorkerMode {
    /// Issue a fixed number of requests.
    Budget {
        /// Requests this worker issues.
        per_worker: u64,
    },
    /// Issue requests until the deadline passes.
    Deadline {
        /// Shared run deadline.
        deadline: Instant,
    },
}

/// Worker loop. Checks cancellation at the top of every iteration.
fn run_worker(
    shared: &EngineShared,
    cancel: &CancelToken,
    observer: &dyn SampleObserver,
    mode: WorkerMode,
) {
    match mode {
        WorkerMode::Budget {
            per_worker,
        } => {
            for _ in 0 .. per_worker {
                if cancel.is_cancelled() {
                    break;
                }
                perform_request(shared, observer);
            }
        }
        WorkerMode::Deadline {
            deadline,
        } => {
            while Instant::now() < deadline && !cancel.is_cancelled() {
                perform_request(shared, observer);
            }
        }
    }
}

/// Issues one request, records its sample, and fans the snapshot out.
fn perform_request(shared: &EngineShared, observer: &dyn SampleObserver) {
    let mut request = shared
        .client
        .request(shared.method.clone(), &shared.url)
        .headers(shared.headers.clone());
    if let Some(body) = &shared.body {
        request = request.body(body.clone());
    }

    let started = Instant::now();
    let status = match request.send() {
        // Headers are in; dropping the response leaves the body undrained.
        Ok(response) => response.status().as_u16(),
        Err(_) => TRANSPORT_FAILURE_STATUS,
    };
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let request_id = shared.sequence.fetch_add(1, Ordering::Relaxed) + 1;
    let timestamp = unix_millis();
    shared.log.append(Sample {
        request_id,
        elapsed_ms,
        status,
        timestamp,
    });

    let is_success = (200 .. 300).contains(&status);
    let (successes, failures) = if is_success {
        (shared.successes.fetch_add(1, Ordering::Relaxed) + 1, shared.failures.load(Ordering::Relaxed))
    } else {
        (shared.successes.load(Ordering::Relaxed), shared.failures.fetch_add(1, Ordering::Relaxed) + 1)
    };
    let latency_sum = shared.latency_sum_ms.fetch_add(elapsed_ms, Ordering::Relaxed) + elapsed_ms;

    #[allow(clippy::cast_precision_loss, reason = "Window length stays far below 2^52.")]
    let current_rps = shared.window.observe(Instant::now()) as f64;
    shared.peak.observe(current_rps);

    let total = successes + failures;
    #[allow(clippy::cast_precision_loss, reason = "Counters stay far below 2^52.")]
    let average_response_time = latency_sum as f64 / total as f64;
    let sample = MetricSample {
        run_token: shared.run_token.clone(),
        timestamp,
        response_time_ms: elapsed_ms,
        status_code: status,
        is_success,
        total_requests: total,
        successful_requests: successes,
        failed_requests: failures,
        current_rps,
        average_response_time,
    };
    observer.on_metric(&sample);
    if request_id % PERSIST_EVERY == 0 {
        observer.persist(&sample);
    }
}

// ============================================================================
// SECTION: Aggregate Construction
// ============================================================================

/// Builds the terminal aggregate from the drained sample log.
fn build_aggregate(shared: &EngineShared, samples: &[Sample], elapsed_ms: u64) -> RunAggregate {
    let total = samples.len() as u64;
    let successful =
        samples.iter().filter(|sample| (200 .. 300).contains(&sample.status)).count() as u64;
    #[allow(clippy::cast_precision_loss, reason = "Latencies stay far below 2^52 ms.")]
    let latencies: Vec<f64> = samples.iter().map(|sample| sample.elapsed_ms as f64).collect();
    let summary = stats::summarize(&latencies);
    #[allow(clippy::cast_precision_loss, reason = "Latencies stay far below 2^52 ms.")]
    let by_status: Vec<(u16, f64)> =
        samples.iter().map(|sample| (sample.status, sample.elapsed_ms as f64)).collect();
    let status_codes = stats::per_status(&by_status)
        .into_iter()
        .map(|(status, group)| (status, StatusAggregate::from(group)))
        .collect();
    RunAggregate {
        run_token: shared.run_token.clone(),
        total_requests: total,
        successful_requests: successful,
        failed_requests: total - successful,
        requests_per_second: shared.peak.get(),
        average_response_time: summary.avg,
        min_response_time: summary.min,
        max_response_time: summary.max,
        percentile50: summary.p50,
        percentile75: summary.p75,
        percentile90: summary.p90,
        percentile95: summary.p95,
        percentile99: summary.p99,
        total_elapsed_time: elapsed_ms,
        status_codes,
    }
}

// ============================================================================
// SECTION: Client and Header Assembly
// ============================================================================

/// Builds the run-scoped blocking client with the plan's TLS policy.
fn build_client(plan: &EnginePlan) -> Result<Client, EngineError> {
    Client::builder()
        .timeout(Duration::from_millis(plan.request_timeout_ms.max(1)))
        .danger_accept_invalid_certs(plan.insecure_tls)
        .build()
        .map_err(|err| EngineError::ClientBuild(err.to_string()))
}

/// Prebuilds the header map applied to every request.
fn build_headers(plan: &EnginePlan) -> Result<HeaderMap, EngineError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        parse_header_value("content-type", &plan.content_type)?,
    );
    if let Some(extra) = &plan.headers {
        for (name, value) in extra {
            headers.insert(parse_header_name(name)?, parse_header_value(name, value)?);
        }
    }
    if let Some(bearer) = &plan.bearer {
        headers.insert(
            parse_header_name(&bearer.name)?,
            parse_header_value(&bearer.name, &bearer.value)?,
        );
    }
    Ok(headers)
}

/// Parses a header name, mapping failures onto [`EngineError::InvalidHeader`].
fn parse_header_name(name: &str) -> Result<HeaderName, EngineError> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|err| EngineError::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

/// Parses a header value, mapping failures onto [`EngineError::InvalidHeader`].
fn parse_header_value(name: &str, value: &str) -> Result<HeaderValue, EngineError> {
    HeaderValue::from_str(value).map_err(|err| EngineError::InvalidHeader {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

/// Maps the method enum onto the client's method type.
fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_criterion_defaults_to_budget_100() {
        assert_eq!(
            StopCriterion::from_settings(None, None),
            StopCriterion::Budget(DEFAULT_REQUEST_BUDGET)
        );
    }

    #[test]
    fn duration_takes_precedence_when_set() {
        assert_eq!(
            StopCriterion::from_settings(None, Some(5)),
            StopCriterion::Duration(Duration::from_secs(5))
        );
    }

    #[test]
    fn rejects_invalid_header_name() {
        let result = parse_header_name("bad header\n");
        assert!(matches!(result, Err(EngineError::InvalidHeader { .. })));
    }
}

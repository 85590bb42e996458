// crates/loadstone-engine/tests/engine.rs
// ============================================================================
// Module: Engine Behavior Tests
// Description: Worker pool semantics against a local fake target.
// Purpose: Pin budget floor policy, timing, cancellation, and fan-out rates.
// Dependencies: loadstone-core, loadstone-engine, tiny_http
// ============================================================================

//! ## Overview
//! Exercises [`loadstone_engine::execute`] end to end: budget splitting,
//! duration deadlines, transport failure mapping, peak RPS semantics,
//! snapshot sampling, bearer injection, and cancellation latency.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions are permitted."
)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use loadstone_core::HttpMethod;
use loadstone_core::MetricSample;
use loadstone_core::RunToken;
use loadstone_engine::BearerHeader;
use loadstone_engine::CancelToken;
use loadstone_engine::EnginePlan;
use loadstone_engine::NoopObserver;
use loadstone_engine::SampleObserver;
use loadstone_engine::StopCriterion;
use loadstone_engine::execute;

use crate::common::spawn_target;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn plan(url: &str, users: u32, stop: StopCriterion) -> EnginePlan {
    EnginePlan {
        run_token: RunToken::new("test-run"),
        url: url.to_string(),
        method: HttpMethod::Get,
        users,
        stop,
        headers: None,
        body: None,
        content_type: "application/json".to_string(),
        insecure_tls: false,
        bearer: None,
        request_timeout_ms: 5_000,
    }
}

/// Observer counting metric and persist callbacks.
#[derive(Default)]
struct CountingObserver {
    metrics: AtomicU64,
    persisted: AtomicU64,
    samples: Mutex<Vec<MetricSample>>,
}

impl SampleObserver for CountingObserver {
    fn on_metric(&self, sample: &MetricSample) {
        self.metrics.fetch_add(1, Ordering::SeqCst);
        self.samples.lock().unwrap().push(sample.clone());
    }

    fn persist(&self, _sample: &MetricSample) {
        self.persisted.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// SECTION: Budget Mode
// ============================================================================

#[test]
fn budget_splits_evenly_across_workers() {
    let target = spawn_target(200, None);
    let outcome = execute(
        &plan(&target.url, 4, StopCriterion::Budget(100)),
        &CancelToken::new(),
        Arc::new(NoopObserver),
    )
    .unwrap();

    assert_eq!(outcome.aggregate.total_requests, 100);
    assert_eq!(outcome.aggregate.successful_requests, 100);
    assert_eq!(outcome.aggregate.failed_requests, 0);
    assert!(!outcome.cancelled);
    assert_eq!(target.hits(), 100);
}

/// Budget splitting uses floor: stragglers from R mod U are not issued.
#[test]
fn budget_floor_policy_drops_stragglers() {
    let target = spawn_target(200, None);
    let outcome = execute(
        &plan(&target.url, 3, StopCriterion::Budget(10)),
        &CancelToken::new(),
        Arc::new(NoopObserver),
    )
    .unwrap();

    // 3 workers * floor(10 / 3) = 9 samples.
    assert_eq!(outcome.aggregate.total_requests, 9);
}

#[test]
fn budget_below_user_count_issues_nothing() {
    let target = spawn_target(200, None);
    let outcome = execute(
        &plan(&target.url, 8, StopCriterion::Budget(5)),
        &CancelToken::new(),
        Arc::new(NoopObserver),
    )
    .unwrap();

    assert_eq!(outcome.aggregate.total_requests, 0);
    assert_eq!(outcome.aggregate.average_response_time, 0.0);
    assert_eq!(target.hits(), 0);
}

// ============================================================================
// SECTION: Aggregate Invariants
// ============================================================================

#[test]
fn aggregate_counts_and_percentiles_are_consistent() {
    let target = spawn_target(200, Some(Duration::from_millis(10)));
    let outcome = execute(
        &plan(&target.url, 2, StopCriterion::Budget(40)),
        &CancelToken::new(),
        Arc::new(NoopObserver),
    )
    .unwrap();
    let aggregate = outcome.aggregate;

    assert_eq!(
        aggregate.total_requests,
        aggregate.successful_requests + aggregate.failed_requests
    );
    assert!(aggregate.min_response_time <= aggregate.percentile50);
    assert!(aggregate.percentile50 <= aggregate.percentile75);
    assert!(aggregate.percentile75 <= aggregate.percentile90);
    assert!(aggregate.percentile90 <= aggregate.percentile95);
    assert!(aggregate.percentile95 <= aggregate.percentile99);
    assert!(aggregate.percentile99 <= aggregate.max_response_time);
    assert!(aggregate.requests_per_second > 0.0);
    let status_200 = &aggregate.status_codes[&200];
    assert_eq!(status_200.count, 40);
}

#[test]
fn transport_failures_record_status_503() {
    // Nothing listens on this port.
    let outcome = execute(
        &plan("http://127.0.0.1:1/load", 1, StopCriterion::Budget(3)),
        &CancelToken::new(),
        Arc::new(NoopObserver),
    )
    .unwrap();
    let aggregate = outcome.aggregate;

    assert_eq!(aggregate.total_requests, 3);
    assert_eq!(aggregate.successful_requests, 0);
    assert_eq!(aggregate.failed_requests, 3);
    assert_eq!(aggregate.status_codes[&503].count, 3);
}

#[test]
fn non_2xx_statuses_count_as_failures() {
    let target = spawn_target(404, None);
    let outcome = execute(
        &plan(&target.url, 2, StopCriterion::Budget(10)),
        &CancelToken::new(),
        Arc::new(NoopObserver),
    )
    .unwrap();

    assert_eq!(outcome.aggregate.total_requests, 10);
    assert_eq!(outcome.aggregate.successful_requests, 0);
    assert_eq!(outcome.aggregate.failed_requests, 10);
}

// ============================================================================
// SECTION: Duration Mode
// ============================================================================

/// Duration runs stay close to their deadline. RPS assertions use runs of at
/// least two seconds because the one-second window never empties on shorter
/// runs and inflates the peak.
#[test]
fn duration_mode_respects_deadline() {
    let target = spawn_target(200, Some(Duration::from_millis(10)));
    let started = Instant::now();
    let outcome = execute(
        &plan(&target.url, 2, StopCriterion::Duration(Duration::from_secs(2))),
        &CancelToken::new(),
        Arc::new(NoopObserver),
    )
    .unwrap();
    let wall = started.elapsed();

    assert!(outcome.aggregate.total_requests > 0);
    assert!(outcome.aggregate.total_elapsed_time >= 2_000);
    assert!(outcome.aggregate.total_elapsed_time <= 2_500);
    assert!(wall >= Duration::from_secs(2));
    assert!(outcome.aggregate.requests_per_second > 0.0);
}

// ============================================================================
// SECTION: Cancellation
// ============================================================================

#[test]
fn cancellation_stops_workers_within_a_request() {
    let target = spawn_target(200, Some(Duration::from_millis(20)));
    let cancel = CancelToken::new();
    let stopper = cancel.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        stopper.cancel();
    });

    let started = Instant::now();
    let outcome = execute(
        &plan(&target.url, 2, StopCriterion::Duration(Duration::from_secs(10))),
        &cancel,
        Arc::new(NoopObserver),
    )
    .unwrap();

    assert!(outcome.cancelled);
    // Well before the ten-second deadline.
    assert!(started.elapsed() < Duration::from_secs(3));
    assert!(outcome.aggregate.total_elapsed_time < 3_000);
}

// ============================================================================
// SECTION: Snapshot Fan-Out
// ============================================================================

#[test]
fn every_sample_streams_and_every_tenth_persists() {
    let target = spawn_target(200, None);
    let observer = Arc::new(CountingObserver::default());
    let outcome = execute(
        &plan(&target.url, 4, StopCriterion::Budget(100)),
        &CancelToken::new(),
        Arc::clone(&observer) as Arc<dyn SampleObserver>,
    )
    .unwrap();

    assert_eq!(outcome.aggregate.total_requests, 100);
    assert_eq!(observer.metrics.load(Ordering::SeqCst), 100);
    assert_eq!(observer.persisted.load(Ordering::SeqCst), 10);

    let samples = observer.samples.lock().unwrap();
    assert!(samples.iter().all(|sample| {
        sample.total_requests == sample.successful_requests + sample.failed_requests
    }));
}

// ============================================================================
// SECTION: Header Injection
// ============================================================================

#[test]
fn bearer_header_reaches_the_target() {
    let target = spawn_target(200, None);
    let mut request_plan = plan(&target.url, 1, StopCriterion::Budget(2));
    request_plan.bearer = Some(BearerHeader {
        name: "Authorization".to_string(),
        value: "Bearer abc".to_string(),
    });
    let mut headers = BTreeMap::new();
    headers.insert("X-Load-Test".to_string(), "loadstone".to_string());
    request_plan.headers = Some(headers);

    let outcome = execute(&request_plan, &CancelToken::new(), Arc::new(NoopObserver)).unwrap();

    assert_eq!(outcome.aggregate.total_requests, 2);
    assert_eq!(target.last_authorization().as_deref(), Some("Bearer abc"));
}

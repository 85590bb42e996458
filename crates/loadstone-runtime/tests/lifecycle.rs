// crates/loadstone-runtime/tests/lifecycle.rs
// ============================================================================
// Module: Run Lifecycle Tests
// Description: Full pipeline scenarios through the coordinator.
// Purpose: Validate the single-run gate and auth, engine, store, stream wiring.
// Dependencies: loadstone-core, loadstone-runtime, tiny_http
// ============================================================================

//! ## Overview
//! End-to-end scenarios through [`loadstone_runtime::RunCoordinator`]:
//! budget and duration runs, token-fetch success and failure, mid-run
//! cancellation, and rejection of a concurrent start.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use loadstone_core::AuthSpec;
use loadstone_core::HttpMethod;
use loadstone_core::MetricHub;
use loadstone_core::RunRequest;
use loadstone_core::RunStatus;
use loadstone_core::StreamEvent;
use loadstone_core::Subscription;
use loadstone_runtime::CatalogStore;
use loadstone_runtime::RunCoordinator;
use loadstone_runtime::StartError;

use crate::common::spawn_auth;
use crate::common::spawn_target;
use crate::common::wait_for_status;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn coordinator() -> RunCoordinator {
    let store = CatalogStore::open_in_memory().unwrap();
    RunCoordinator::new(store, Arc::new(MetricHub::new()))
}

fn budget_request(url: &str, users: u32, requests: u64) -> RunRequest {
    RunRequest {
        url: url.to_string(),
        method: HttpMethod::Get,
        users,
        requests: Some(requests),
        duration_secs: None,
        body: None,
        content_type: "application/json".to_string(),
        headers: None,
        insecure_tls: false,
        auth: None,
    }
}

fn duration_request(url: &str, users: u32, secs: u64) -> RunRequest {
    RunRequest {
        duration_secs: Some(secs),
        requests: None,
        ..budget_request(url, users, 0)
    }
}

fn auth_spec(url: String) -> AuthSpec {
    AuthSpec {
        url,
        method: HttpMethod::Post,
        content_type: "application/json".to_string(),
        body: None,
        headers: None,
        token_path: "data.token".to_string(),
        header_name: "Authorization".to_string(),
        header_prefix: "Bearer ".to_string(),
    }
}

/// Drains events until the predicate matches or the timeout passes.
fn wait_for_event(
    subscription: &Subscription,
    timeout: Duration,
    predicate: impl Fn(&StreamEvent) -> bool,
) -> Vec<StreamEvent> {
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    while Instant::now() < deadline {
        if let Some(event) = subscription.recv_timeout(Duration::from_millis(100)) {
            let done = predicate(&event);
            seen.push(event);
            if done {
                return seen;
            }
        }
    }
    panic!("expected event not observed; saw {} events", seen.len());
}

// ============================================================================
// SECTION: Scenario 1: Budget Run
// ============================================================================

#[test]
fn budget_run_completes_with_exact_totals() {
    let target = spawn_target(200, Some(Duration::from_millis(10)));
    let coordinator = coordinator();
    let subscription = coordinator.subscribe();

    let token = coordinator.start_ad_hoc_run(&budget_request(&target.url, 4, 100)).unwrap();
    let events = wait_for_event(&subscription, Duration::from_secs(30), |event| {
        matches!(event, StreamEvent::TestCompleted { .. })
    });

    let Some(StreamEvent::TestCompleted {
        aggregate,
    }) = events.last()
    else {
        panic!("missing TestCompleted");
    };
    assert_eq!(aggregate.run_token, token);
    assert_eq!(aggregate.total_requests, 100);
    assert_eq!(aggregate.successful_requests, 100);
    assert_eq!(aggregate.failed_requests, 0);
    assert!(aggregate.average_response_time >= 10.0);
    assert!(aggregate.min_response_time >= 10.0);
    assert!(aggregate.percentile50 >= 10.0);
    assert!(aggregate.requests_per_second > 0.0);

    wait_for_status(coordinator.store(), &token, RunStatus::Completed, Duration::from_secs(5));
    assert!(!coordinator.is_running());
}

// ============================================================================
// SECTION: Scenario 2: Duration Run
// ============================================================================

#[test]
fn duration_run_bounds_elapsed_and_snapshot_times() {
    let target = spawn_target(200, Some(Duration::from_millis(10)));
    let coordinator = coordinator();
    let subscription = coordinator.subscribe();

    let token = coordinator.start_ad_hoc_run(&duration_request(&target.url, 2, 2)).unwrap();
    let events = wait_for_event(&subscription, Duration::from_secs(30), |event| {
        matches!(event, StreamEvent::TestCompleted { .. })
    });
    let Some(StreamEvent::TestCompleted {
        aggregate,
    }) = events.last()
    else {
        panic!("missing TestCompleted");
    };
    assert!(aggregate.total_requests > 0);
    assert!(aggregate.total_elapsed_time >= 2_000);
    assert!(aggregate.total_elapsed_time <= 2_500);

    wait_for_status(coordinator.store(), &token, RunStatus::Completed, Duration::from_secs(5));
    let run = coordinator.store().get_run_by_token(&token).unwrap().unwrap();
    let timeline = coordinator.store().get_run_timeline(run.id).unwrap().unwrap();
    assert!(!timeline.snapshots.is_empty());
    let completed_at = run.completed_at.unwrap();
    for snapshot in &timeline.snapshots {
        assert!(snapshot.timestamp >= run.started_at);
        assert!(snapshot.timestamp <= completed_at);
    }
}

// ============================================================================
// SECTION: Scenario 3: Token Fetch Success
// ============================================================================

#[test]
fn auth_success_precedes_metrics_and_injects_header() {
    let target = spawn_target(200, Some(Duration::from_millis(5)));
    let auth_url = spawn_auth(200, r#"{"data":{"token":"abc"}}"#);
    let coordinator = coordinator();
    let subscription = coordinator.subscribe();

    let mut request = budget_request(&target.url, 2, 20);
    request.auth = Some(auth_spec(auth_url));
    coordinator.start_ad_hoc_run(&request).unwrap();

    let events = wait_for_event(&subscription, Duration::from_secs(30), |event| {
        matches!(event, StreamEvent::TestCompleted { .. })
    });

    let auth_success = events
        .iter()
        .position(|event| matches!(event, StreamEvent::AuthenticationSuccess { .. }))
        .expect("AuthenticationSuccess not observed");
    let first_metric = events
        .iter()
        .position(|event| matches!(event, StreamEvent::MetricReceived { .. }))
        .expect("MetricReceived not observed");
    assert!(auth_success < first_metric);
    assert_eq!(target.last_authorization().as_deref(), Some("Bearer abc"));
}

// ============================================================================
// SECTION: Scenario 4: Token Fetch Failure
// ============================================================================

#[test]
fn auth_rejection_fails_the_run_without_metrics() {
    let target = spawn_target(200, None);
    let auth_url = spawn_auth(401, r#"{"error":"denied"}"#);
    let coordinator = coordinator();
    let subscription = coordinator.subscribe();

    let mut request = budget_request(&target.url, 2, 20);
    request.auth = Some(auth_spec(auth_url));
    let token = coordinator.start_ad_hoc_run(&request).unwrap();

    let events = wait_for_event(&subscription, Duration::from_secs(10), |event| {
        matches!(event, StreamEvent::TestError { .. })
    });
    assert!(events.iter().any(|event| matches!(event, StreamEvent::AuthenticationFailed { .. })));
    assert!(!events.iter().any(|event| matches!(event, StreamEvent::MetricReceived { .. })));

    wait_for_status(coordinator.store(), &token, RunStatus::Failed, Duration::from_secs(5));
    let run = coordinator.store().get_run_by_token(&token).unwrap().unwrap();
    assert!(run.error_message.unwrap().contains("401"));
    assert_eq!(target.hits(), 0);
}

// ============================================================================
// SECTION: Scenario 5: Cancellation
// ============================================================================

#[test]
fn stop_cancels_a_duration_run_promptly() {
    let target = spawn_target(200, Some(Duration::from_millis(20)));
    let coordinator = coordinator();
    let subscription = coordinator.subscribe();

    let token = coordinator.start_ad_hoc_run(&duration_request(&target.url, 2, 10)).unwrap();
    thread::sleep(Duration::from_millis(1_000));
    coordinator.stop();

    wait_for_status(coordinator.store(), &token, RunStatus::Cancelled, Duration::from_secs(5));
    let run = coordinator.store().get_run_by_token(&token).unwrap().unwrap();
    let aggregate = run.aggregate.unwrap();
    assert!(aggregate.total_requests > 0);
    assert!(aggregate.total_elapsed_time < 5_000);

    // Cancellation is visible only through the persisted status.
    thread::sleep(Duration::from_millis(200));
    let mut completed = false;
    while let Some(event) = subscription.try_recv() {
        if matches!(event, StreamEvent::TestCompleted { .. }) {
            completed = true;
        }
    }
    assert!(!completed, "cancelled runs must not emit TestCompleted");
    assert!(!coordinator.is_running());
}

#[test]
fn stop_without_active_run_is_a_noop() {
    let coordinator = coordinator();
    coordinator.stop();
    assert!(!coordinator.is_running());
}

// ============================================================================
// SECTION: Scenario 6: Concurrent Start
// ============================================================================

#[test]
fn second_start_is_rejected_while_running() {
    let target = spawn_target(200, Some(Duration::from_millis(10)));
    let coordinator = coordinator();

    let token = coordinator.start_ad_hoc_run(&duration_request(&target.url, 2, 5)).unwrap();
    assert!(coordinator.is_running());

    let second = coordinator.start_ad_hoc_run(&budget_request(&target.url, 1, 10));
    assert!(matches!(second, Err(StartError::RunInProgress)));

    coordinator.stop();
    wait_for_status(coordinator.store(), &token, RunStatus::Cancelled, Duration::from_secs(5));

    // The first run was unaffected by the rejected start.
    let run = coordinator.store().get_run_by_token(&token).unwrap().unwrap();
    assert!(run.aggregate.is_some());
}

// ============================================================================
// SECTION: Endpoint Runs
// ============================================================================

#[test]
fn endpoint_run_uses_captured_configuration() {
    let target = spawn_target(200, None);
    let coordinator = coordinator();
    let store = coordinator.store();

    let project = store
        .create_project(&loadstone_core::NewProject {
            name: "perf".to_string(),
            description: None,
            auth: None,
        })
        .unwrap();
    let endpoint = store
        .create_endpoint(project.id, &loadstone_core::EndpointSpec {
            name: "ping".to_string(),
            description: None,
            url: target.url.clone(),
            method: HttpMethod::Get,
            users: 2,
            requests: Some(20),
            duration_secs: None,
            content_type: "application/json".to_string(),
            body: None,
            insecure_tls: false,
            requires_auth: false,
            headers: Some(BTreeMap::new()),
            auth: None,
        })
        .unwrap();

    let token = coordinator.start_endpoint_run(endpoint.id, Some(4)).unwrap();
    wait_for_status(store, &token, RunStatus::Completed, Duration::from_secs(30));

    let run = store.get_run_by_token(&token).unwrap().unwrap();
    assert_eq!(run.users, 4);
    assert_eq!(run.endpoint_id, Some(endpoint.id));
    // 4 workers * floor(20 / 4) = 20.
    assert_eq!(run.aggregate.unwrap().total_requests, 20);
}

#[test]
fn unknown_endpoint_start_is_not_found() {
    let coordinator = coordinator();
    let ghost = loadstone_core::EndpointId::from_raw(404).unwrap();
    assert!(matches!(
        coordinator.start_endpoint_run(ghost, None),
        Err(StartError::NotFound(_))
    ));
}

// crates/loadstone-core/tests/stream.rs
// ============================================================================
// Module: Metric Stream Tests
// Description: Broadcast delivery, lossy metrics, and subscriber lifecycle.
// Purpose: Validate MetricHub fan-out guarantees.
// Dependencies: loadstone-core, serde_json
// ============================================================================

//! ## Overview
//! Exercises [`loadstone_core::MetricHub`] delivery semantics: connected
//! handshake, publish ordering, lossy metric drops for saturated mailboxes,
//! reliable terminal delivery, and reaping of departed subscribers.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]

use std::time::Duration;

use loadstone_core::MetricHub;
use loadstone_core::MetricSample;
use loadstone_core::RunAggregate;
use loadstone_core::RunToken;
use loadstone_core::StreamEvent;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn sample(token: &str, total: u64) -> MetricSample {
    MetricSample {
        run_token: RunToken::new(token),
        timestamp: 1_700_000_000_000,
        response_time_ms: 25,
        status_code: 200,
        is_success: true,
        total_requests: total,
        successful_requests: total,
        failed_requests: 0,
        current_rps: 40.0,
        average_response_time: 25.0,
    }
}

fn metric_event(token: &str, total: u64) -> StreamEvent {
    StreamEvent::MetricReceived {
        sample: sample(token, total),
    }
}

fn completed_event(token: &str) -> StreamEvent {
    StreamEvent::TestCompleted {
        aggregate: RunAggregate::empty(RunToken::new(token), 1_000),
    }
}

// ============================================================================
// SECTION: Attach and Ordering
// ============================================================================

#[test]
fn subscriber_receives_connected_first() {
    let hub = MetricHub::new();
    let subscription = hub.subscribe();
    match subscription.recv_timeout(Duration::from_secs(1)) {
        Some(StreamEvent::Connected {
            subscriber_id,
        }) => assert_eq!(subscriber_id, subscription.id()),
        other => panic!("expected Connected, got {other:?}"),
    }
}

#[test]
fn events_arrive_in_publish_order() {
    let hub = MetricHub::new();
    let subscription = hub.subscribe();
    let _ = subscription.recv_timeout(Duration::from_secs(1)).unwrap();

    for total in 1 ..= 5 {
        hub.publish_metric(&metric_event("run-1", total));
    }
    hub.publish_reliable(&completed_event("run-1"));

    for expected in 1 ..= 5u64 {
        match subscription.recv_timeout(Duration::from_secs(1)) {
            Some(StreamEvent::MetricReceived {
                sample,
            }) => assert_eq!(sample.total_requests, expected),
            other => panic!("expected MetricReceived, got {other:?}"),
        }
    }
    assert!(matches!(
        subscription.recv_timeout(Duration::from_secs(1)),
        Some(StreamEvent::TestCompleted { .. })
    ));
}

#[test]
fn no_replay_for_late_subscribers() {
    let hub = MetricHub::new();
    hub.publish_metric(&metric_event("run-1", 1));
    hub.publish_reliable(&completed_event("run-1"));

    let late = hub.subscribe();
    let _ = late.recv_timeout(Duration::from_secs(1)).unwrap();
    assert!(late.try_recv().is_none());
}

// ============================================================================
// SECTION: Back-Pressure Isolation
// ============================================================================

#[test]
fn saturated_subscriber_drops_metrics_but_keeps_terminals() {
    let hub = MetricHub::with_lossy_capacity(4);
    let slow = hub.subscribe();

    // Fill the mailbox without draining (Connected already occupies a slot).
    for total in 1 ..= 20 {
        hub.publish_metric(&metric_event("run-1", total));
    }
    hub.publish_reliable(&completed_event("run-1"));

    let mut metrics = 0;
    let mut completed = 0;
    while let Some(event) = slow.try_recv() {
        match event {
            StreamEvent::MetricReceived {
                ..
            } => metrics += 1,
            StreamEvent::TestCompleted {
                ..
            } => completed += 1,
            StreamEvent::Connected {
                ..
            } => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(metrics < 20, "lossy capacity must drop metric events");
    assert_eq!(completed, 1, "terminal events are reliable");
}

#[test]
fn fast_subscriber_unaffected_by_slow_peer() {
    let hub = MetricHub::with_lossy_capacity(2);
    let _slow = hub.subscribe();
    let fast = hub.subscribe();
    let _ = fast.recv_timeout(Duration::from_secs(1)).unwrap();

    let mut received = 0;
    for total in 1 ..= 50 {
        hub.publish_metric(&metric_event("run-1", total));
        while fast.try_recv().is_some() {
            received += 1;
        }
    }
    assert_eq!(received, 50);
}

// ============================================================================
// SECTION: Departure
// ============================================================================

#[test]
fn departed_subscriber_is_reaped() {
    let hub = MetricHub::new();
    let subscription = hub.subscribe();
    assert_eq!(hub.subscriber_count(), 1);

    drop(subscription);
    hub.publish_reliable(&completed_event("run-1"));
    assert_eq!(hub.subscriber_count(), 0);
}

// ============================================================================
// SECTION: Wire Names
// ============================================================================

#[test]
fn event_wire_names_are_pinned() {
    let metric = serde_json::to_value(hub_event()).unwrap();
    assert_eq!(metric["event"], "MetricReceived");

    let completed = serde_json::to_value(completed_event("run-1")).unwrap();
    assert_eq!(completed["event"], "TestCompleted");

    let auth_failed = serde_json::to_value(StreamEvent::AuthenticationFailed {
        run_token: RunToken::new("run-1"),
        error: "status 401".to_string(),
    })
    .unwrap();
    assert_eq!(auth_failed["event"], "AuthenticationFailed");
    assert_eq!(auth_failed["runToken"], "run-1");
}

fn hub_event() -> StreamEvent {
    metric_event("run-1", 1)
}

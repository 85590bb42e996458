// crates/loadstone-core/tests/stats.rs
// ============================================================================
// Module: Statistics Tests
// Description: Percentile formula pins and aggregation behavior.
// Purpose: Lock the interpolated-rank percentile definition and summaries.
// Dependencies: loadstone-core
// ============================================================================

//! ## Overview
//! The percentile formula is a wire-level contract: downstream consumers
//! compare aggregates across runs, so the definition here is pinned exactly.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions are permitted."
)]

use loadstone_core::stats::LatencySummary;
use loadstone_core::stats::StatsError;
use loadstone_core::stats::per_status;
use loadstone_core::stats::percentile;
use loadstone_core::stats::summarize;

// ============================================================================
// SECTION: Percentile Formula Pins
// ============================================================================

/// P50 over ten evenly spaced values interpolates to 55.0 exactly:
/// position = 11 * 0.5 = 5.5, index = 4.5, 50 + 0.5 * (60 - 50).
#[test]
fn percentile_interpolated_rank_pin() {
    let values = [10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0];
    assert_eq!(percentile(&values, 50.0).unwrap(), 55.0);
}

#[test]
fn percentile_clamps_low_rank_to_first() {
    let values = [10.0, 20.0, 30.0];
    assert_eq!(percentile(&values, 0.0).unwrap(), 10.0);
}

#[test]
fn percentile_clamps_high_rank_to_last() {
    let values = [10.0, 20.0, 30.0];
    assert_eq!(percentile(&values, 100.0).unwrap(), 30.0);
    assert_eq!(percentile(&values, 99.0).unwrap(), 30.0);
}

#[test]
fn percentile_single_sample_is_that_sample() {
    assert_eq!(percentile(&[42.0], 50.0).unwrap(), 42.0);
    assert_eq!(percentile(&[42.0], 99.0).unwrap(), 42.0);
}

#[test]
fn percentile_sorts_unordered_input() {
    let values = [100.0, 10.0, 50.0, 30.0, 90.0, 20.0, 80.0, 40.0, 70.0, 60.0];
    assert_eq!(percentile(&values, 50.0).unwrap(), 55.0);
}

#[test]
fn percentile_rejects_empty_input() {
    assert_eq!(percentile(&[], 50.0), Err(StatsError::EmptyInput));
}

#[test]
fn percentile_rejects_out_of_range_rank() {
    let values = [1.0, 2.0];
    assert!(matches!(
        percentile(&values, -1.0),
        Err(StatsError::PercentileOutOfRange(_))
    ));
    assert!(matches!(
        percentile(&values, 100.5),
        Err(StatsError::PercentileOutOfRange(_))
    ));
}

// ============================================================================
// SECTION: Summaries
// ============================================================================

#[test]
fn summarize_empty_is_all_zero() {
    let summary = summarize(&[]);
    assert_eq!(summary, LatencySummary::default());
    assert_eq!(summary.count, 0);
    assert_eq!(summary.avg, 0.0);
}

#[test]
fn summarize_orders_percentiles() {
    let latencies: Vec<f64> = (1 ..= 200).map(f64::from).collect();
    let summary = summarize(&latencies);
    assert_eq!(summary.count, 200);
    assert_eq!(summary.min, 1.0);
    assert_eq!(summary.max, 200.0);
    assert!(summary.min <= summary.p50);
    assert!(summary.p50 <= summary.p75);
    assert!(summary.p75 <= summary.p90);
    assert!(summary.p90 <= summary.p95);
    assert!(summary.p95 <= summary.p99);
    assert!(summary.p99 <= summary.max);
}

#[test]
fn summarize_uniform_samples_collapse() {
    let summary = summarize(&[50.0; 40]);
    assert_eq!(summary.min, 50.0);
    assert_eq!(summary.max, 50.0);
    assert_eq!(summary.avg, 50.0);
    assert_eq!(summary.p50, 50.0);
    assert_eq!(summary.p99, 50.0);
}

#[test]
fn per_status_groups_by_code() {
    let samples = vec![(200, 10.0), (200, 20.0), (503, 100.0), (404, 5.0), (200, 30.0)];
    let grouped = per_status(&samples);
    assert_eq!(grouped.len(), 3);
    assert_eq!(grouped[&200].count, 3);
    assert_eq!(grouped[&200].avg, 20.0);
    assert_eq!(grouped[&503].count, 1);
    assert_eq!(grouped[&503].max, 100.0);
    assert_eq!(grouped[&404].count, 1);
}

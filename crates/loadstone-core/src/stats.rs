// crates/loadstone-core/src/stats.rs
// ============================================================================
// Module: Loadstone Statistics
// Description: Percentile and latency aggregation over response samples.
// Purpose: One pinned percentile definition shared by engine and store.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Pure, stateless aggregation. The percentile is the interpolated rank at
//! `position = (n + 1) * p / 100` over the ascending sort; small samples
//! clamp to the first or last element. Other percentile conventions disagree
//! on small inputs, so callers must not substitute their own definition.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors from statistics functions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Percentile requested over an empty sample set.
    #[error("percentile requires at least one sample")]
    EmptyInput,
    /// Percentile rank outside [0, 100].
    #[error("percentile must be within [0, 100], got {0}")]
    PercentileOutOfRange(f64),
}

// ============================================================================
// SECTION: Percentile
// ============================================================================

/// Computes the interpolated `p`-th percentile of `values`.
///
/// Sorts ascending, takes `position = (n + 1) * p / 100` and
/// `index = position - 1`, clamps below zero to the first element and at or
/// above `n - 1` to the last, and otherwise interpolates linearly between
/// the two neighboring elements.
///
/// # Errors
///
/// Returns [`StatsError::EmptyInput`] on an empty slice and
/// [`StatsError::PercentileOutOfRange`] when `p` is outside [0, 100].
pub fn percentile(values: &[f64], p: f64) -> Result<f64, StatsError> {
    if values.is_empty() {
        return Err(StatsError::EmptyInput);
    }
    if !(0.0 ..= 100.0).contains(&p) {
        return Err(StatsError::PercentileOutOfRange(p));
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    #[allow(clippy::cast_precision_loss, reason = "Sample counts stay far below 2^52.")]
    let position = (n as f64 + 1.0) * p / 100.0;
    let index = position - 1.0;
    if index < 0.0 {
        return Ok(sorted[0]);
    }
    let whole = index.floor();
    let fraction = index - whole;
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Non-negative and bounded by the sample count after the clamp checks."
    )]
    let k = whole as usize;
    if k >= n - 1 {
        return Ok(sorted[n - 1]);
    }
    Ok(sorted[k] + fraction * (sorted[k + 1] - sorted[k]))
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Latency aggregate over a sample set.
///
/// # Invariants
/// - All fields are zero when `count` is zero.
/// - `min <= p50 <= p75 <= p90 <= p95 <= p99 <= max` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatencySummary {
    /// Sample count.
    pub count: u64,
    /// Sum of samples in milliseconds.
    pub sum: f64,
    /// Average in milliseconds.
    pub avg: f64,
    /// Minimum in milliseconds.
    pub min: f64,
    /// Maximum in milliseconds.
    pub max: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 75th percentile.
    pub p75: f64,
    /// 90th percentile.
    pub p90: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

/// Aggregates latency samples into count, average, extrema, and percentiles.
///
/// Zero samples yield the all-zero summary rather than an error.
#[must_use]
pub fn summarize(latencies: &[f64]) -> LatencySummary {
    if latencies.is_empty() {
        return LatencySummary::default();
    }
    let count = latencies.len() as u64;
    let sum: f64 = latencies.iter().sum();
    let min = latencies.iter().copied().fold(f64::INFINITY, f64::min);
    let max = latencies.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    #[allow(clippy::cast_precision_loss, reason = "Sample counts stay far below 2^52.")]
    let avg = sum / count as f64;
    // Non-empty input and in-range ranks cannot fail here.
    let rank = |p: f64| percentile(latencies, p).unwrap_or(0.0);
    LatencySummary {
        count,
        sum,
        avg,
        min,
        max,
        p50: rank(50.0),
        p75: rank(75.0),
        p90: rank(90.0),
        p95: rank(95.0),
        p99: rank(99.0),
    }
}

/// Groups samples by status code and summarizes each group.
#[must_use]
pub fn per_status(samples: &[(u16, f64)]) -> BTreeMap<u16, LatencySummary> {
    let mut grouped: BTreeMap<u16, Vec<f64>> = BTreeMap::new();
    for (status, elapsed) in samples {
        grouped.entry(*status).or_default().push(*elapsed);
    }
    grouped.into_iter().map(|(status, latencies)| (status, summarize(&latencies))).collect()
}

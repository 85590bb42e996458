// crates/loadstone-engine/src/observer.rs
// ============================================================================
// Module: Engine Sample Observer
// Description: Fan-out seam for per-sample snapshots.
// Purpose: Decouple the engine from the stream and the store.
// Dependencies: loadstone-core
// ============================================================================

//! ## Overview
//! The engine calls [`SampleObserver::on_metric`] for every recorded sample
//! and [`SampleObserver::persist`] for every tenth one. Implementations must
//! not block: stream delivery drops for slow subscribers, and persistence is
//! expected to swallow its own failures (telemetry is best-effort).

// ============================================================================
// SECTION: Imports
// ============================================================================

use loadstone_core::MetricSample;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Receives snapshot fan-out from the engine.
pub trait SampleObserver: Send + Sync {
    /// Called for every recorded sample.
    fn on_metric(&self, sample: &MetricSample);

    /// Called for every tenth sample (sequence modulo 10 == 0).
    fn persist(&self, sample: &MetricSample);
}

/// Observer that discards all snapshots.
pub struct NoopObserver;

impl SampleObserver for NoopObserver {
    fn on_metric(&self, _sample: &MetricSample) {}

    fn persist(&self, _sample: &MetricSample) {}
}

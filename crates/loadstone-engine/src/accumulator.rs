// crates/loadstone-engine/src/accumulator.rs
// ============================================================================
// Module: Engine Accumulator
// Description: Shared sample log, RPS window, and peak-RPS scalar.
// Purpose: Collect per-response measurements from N workers without stalls.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Three shared structures back a run: an append-only sample log drained
//! once at completion, a one-second sliding window of request timestamps
//! whose length is the current RPS, and a peak-RPS scalar maintained by
//! compare-and-set over the f64 bit pattern. Window eviction is lazy and may
//! race with enqueues; the RPS value is a statistic and a one-sample skew is
//! acceptable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Width of the sliding RPS window.
pub const RPS_WINDOW: Duration = Duration::from_secs(1);

// ============================================================================
// SECTION: Samples
// ============================================================================

/// One recorded response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    /// Monotonic request sequence number for the run.
    pub request_id: u64,
    /// Elapsed milliseconds to headers-received, truncated toward zero.
    pub elapsed_ms: u64,
    /// HTTP status code (503 for transport failures).
    pub status: u16,
    /// Wall-clock timestamp in unix milliseconds.
    pub timestamp: i64,
}

/// Append-only sample log shared by all workers.
///
/// # Invariants
/// - Appends happen during the run; the drain happens once after all
///   workers have exited.
#[derive(Debug, Default)]
pub struct SampleLog {
    /// Recorded samples.
    samples: Mutex<Vec<Sample>>,
}

impl SampleLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one sample.
    pub fn append(&self, sample: Sample) {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner).push(sample);
    }

    /// Takes all recorded samples, leaving the log empty.
    #[must_use]
    pub fn drain(&self) -> Vec<Sample> {
        std::mem::take(&mut *self.samples.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Returns the number of recorded samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no samples are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// SECTION: RPS Window
// ============================================================================

/// Sliding one-second window of request timestamps.
///
/// # Invariants
/// - Entries older than [`RPS_WINDOW`] are evicted lazily on enqueue.
#[derive(Debug, Default)]
pub struct RpsWindow {
    /// Timestamps of recent requests, oldest first.
    recent: Mutex<VecDeque<Instant>>,
}

impl RpsWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request at `now` and returns the windowed request count.
    pub fn observe(&self, now: Instant) -> usize {
        let mut recent = self.recent.lock().unwrap_or_else(PoisonError::into_inner);
        recent.push_back(now);
        while let Some(oldest) = recent.front() {
            if now.duration_since(*oldest) > RPS_WINDOW {
                recent.pop_front();
            } else {
                break;
            }
        }
        recent.len()
    }
}

// ============================================================================
// SECTION: Peak RPS
// ============================================================================

/// Maximum windowed RPS observed during a run.
///
/// # Invariants
/// - Updated by compare-and-set; never decreases.
#[derive(Debug, Default)]
pub struct PeakRps {
    /// f64 bit pattern of the peak value.
    bits: AtomicU64,
}

impl PeakRps {
    /// Creates a zeroed peak tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the peak to `rps` when it exceeds the stored value.
    pub fn observe(&self, rps: f64) {
        let mut current = self.bits.load(Ordering::Relaxed);
        while rps > f64::from_bits(current) {
            match self.bits.compare_exchange_weak(
                current,
                rps.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }

    /// Returns the peak observed so far.
    #[must_use]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_counts_only_recent_entries() {
        let window = RpsWindow::new();
        let start = Instant::now();
        assert_eq!(window.observe(start), 1);
        assert_eq!(window.observe(start + Duration::from_millis(500)), 2);
        // Two seconds later both earlier entries have aged out.
        assert_eq!(window.observe(start + Duration::from_secs(2)), 1);
    }

    #[test]
    fn peak_never_decreases() {
        let peak = PeakRps::new();
        peak.observe(10.0);
        peak.observe(4.0);
        assert!((peak.get() - 10.0).abs() < f64::EPSILON);
        peak.observe(12.5);
        assert!((peak.get() - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    fn log_drains_once() {
        let log = SampleLog::new();
        log.append(Sample {
            request_id: 1,
            elapsed_ms: 12,
            status: 200,
            timestamp: 0,
        });
        assert_eq!(log.len(), 1);
        assert_eq!(log.drain().len(), 1);
        assert!(log.is_empty());
    }
}

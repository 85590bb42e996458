// crates/loadstone-core/src/time.rs
// ============================================================================
// Module: Loadstone Time Helpers
// Description: Wall-clock timestamp helper for catalog records.
// Purpose: One conversion point from system time to unix milliseconds.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Catalog records and metric samples carry unix-epoch milliseconds as `i64`.
//! Elapsed-time measurement inside the engine uses monotonic clocks and never
//! goes through this helper.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current wall-clock time as unix milliseconds.
#[must_use]
pub fn unix_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}

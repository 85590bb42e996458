// crates/loadstone-core/src/error.rs
// ============================================================================
// Module: Loadstone Core Errors
// Description: Validation errors surfaced before a run is admitted.
// Purpose: Reject malformed run requests without touching engine state.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Validation failures are surfaced to the caller and never start a run.
//! Per-request transport failures during a run are not errors at this level;
//! they are recorded as status-503 samples by the engine.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Validation Errors
// ============================================================================

/// Errors rejecting a run request before execution.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Target URL is missing or empty.
    #[error("target url is required")]
    MissingUrl,
    /// User count below the minimum of one.
    #[error("user count must be at least 1")]
    InvalidUsers,
    /// Request budget below the minimum of one.
    #[error("request budget must be at least 1")]
    InvalidRequests,
    /// Duration below the minimum of one second.
    #[error("duration must be at least 1 second")]
    InvalidDuration,
    /// Request budget and duration were both set.
    #[error("request budget and duration are mutually exclusive")]
    ConflictingStopCriteria,
    /// HTTP method outside the supported set.
    #[error("unsupported http method: {0}")]
    UnknownMethod(String),
}

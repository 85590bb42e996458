// crates/loadstone-engine/src/cancel.rs
// ============================================================================
// Module: Engine Cancellation
// Description: Cooperative stop token shared by all workers of a run.
// Purpose: Let an external stop request terminate the pool promptly.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Workers check the token at the top of every loop iteration; the
//! per-request client timeout bounds the in-flight call, so cancellation is
//! observed within one request's worth of time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

// ============================================================================
// SECTION: Cancel Token
// ============================================================================

/// Cooperative cancellation flag for one run.
///
/// # Invariants
/// - Once cancelled the token never resets; a new run gets a new token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Shared cancellation flag.
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates an uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true when cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}

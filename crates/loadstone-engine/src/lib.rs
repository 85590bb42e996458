// crates/loadstone-engine/src/lib.rs
// ============================================================================
// Module: Loadstone Engine Library
// Description: Worker pool driving HTTP load against a single target.
// Purpose: Execute one run and produce its terminal aggregate.
// Dependencies: loadstone-core, reqwest, thiserror, tracing
// ============================================================================

//! ## Overview
//! The engine spawns one OS thread per virtual user over a shared blocking
//! HTTP client, times each response to headers-received, and fans per-sample
//! snapshots out through the [`SampleObserver`] seam. Two stop modes exist:
//! a total request budget split `floor(R / U)` per worker, or a wall-clock
//! deadline. A cooperative [`CancelToken`] stops the pool early.
//! Invariants:
//! - Response bodies are never drained; latency covers headers only.
//! - Transport failures are recorded as status-503 samples, not errors.
//! - The reported requests-per-second is the peak one-second windowed rate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod accumulator;
pub mod cancel;
pub mod engine;
pub mod observer;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use cancel::CancelToken;
pub use engine::BearerHeader;
pub use engine::EngineError;
pub use engine::EngineOutcome;
pub use engine::EnginePlan;
pub use engine::StopCriterion;
pub use engine::execute;
pub use observer::NoopObserver;
pub use observer::SampleObserver;

// crates/loadstone-core/src/lib.rs
// ============================================================================
// Module: Loadstone Core Library
// Description: Data model, statistics, and live metric stream for Loadstone.
// Purpose: Shared types and pure logic consumed by the engine, store, and adapters.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Loadstone Core defines the catalog data model (projects, endpoints, runs),
//! the wire types exchanged with adapters (metric samples, run aggregates,
//! stream events), the percentile statistics used for run aggregation, and
//! the in-process [`MetricHub`] broadcast that fans live metrics out to
//! subscribers.
//! Invariants:
//! - Wire event names are stable contracts and must not be renamed.
//! - Statistics are pure functions; the hub is the only stateful component.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod error;
pub mod identifiers;
pub mod model;
pub mod run;
pub mod stats;
pub mod stream;
pub mod time;
pub mod validate;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use error::ValidationError;
pub use identifiers::EndpointId;
pub use identifiers::ProjectId;
pub use identifiers::RunId;
pub use identifiers::RunToken;
pub use identifiers::SubscriberId;
pub use model::AuthSpec;
pub use model::Endpoint;
pub use model::EndpointSpec;
pub use model::HttpMethod;
pub use model::NewProject;
pub use model::Project;
pub use model::ProjectUpdate;
pub use model::RunRequest;
pub use run::MetricSample;
pub use run::Run;
pub use run::RunAggregate;
pub use run::RunDetail;
pub use run::RunQuery;
pub use run::RunStatistics;
pub use run::RunStatus;
pub use run::RunTimeline;
pub use run::StatusAggregate;
pub use stats::LatencySummary;
pub use stats::StatsError;
pub use stats::per_status;
pub use stats::percentile;
pub use stats::summarize;
pub use stream::MetricHub;
pub use stream::StreamEvent;
pub use stream::Subscription;
pub use time::unix_millis;
pub use validate::validate_run_request;

// crates/loadstone-core/src/run.rs
// ============================================================================
// Module: Loadstone Run Records
// Description: Run lifecycle records, metric samples, and aggregates.
// Purpose: Capture per-run history and the wire shapes adapters consume.
// Dependencies: serde, crate::{identifiers, model, stats}
// ============================================================================

//! ## Overview
//! A [`Run`] captures its target configuration at creation time so later
//! endpoint edits do not alter history. [`MetricSample`] is the per-response
//! wire record streamed to subscribers and sampled into the persisted
//! timeline. [`RunAggregate`] is the terminal result; its
//! `requests_per_second` field reports the peak windowed rate, not an
//! average.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::EndpointId;
use crate::identifiers::ProjectId;
use crate::identifiers::RunId;
use crate::identifiers::RunToken;
use crate::model::Endpoint;
use crate::model::HttpMethod;
use crate::model::Project;
use crate::stats::LatencySummary;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization and store round-trips.
/// - At most one run per process is `Running` at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is executing.
    Running,
    /// Run finished by exhausting its stop criterion.
    Completed,
    /// Run aborted on auth or engine failure.
    Failed,
    /// Run stopped by an external cancel.
    Cancelled,
}

impl RunStatus {
    /// Returns the stable lowercase label used by the store.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a stored status label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Run Record
// ============================================================================

/// A recorded load run.
///
/// # Invariants
/// - Target configuration is captured at creation and never rewritten.
/// - `aggregate` is present iff the run reached a terminal status with
///   samples recorded (all-zero aggregates are still recorded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Run identifier.
    pub id: RunId,
    /// Externally visible run token.
    pub token: RunToken,
    /// Originating endpoint (cleared when the endpoint is deleted).
    pub endpoint_id: Option<EndpointId>,
    /// Captured target URL.
    pub url: String,
    /// Captured HTTP method.
    pub method: HttpMethod,
    /// Captured virtual user count.
    pub users: u32,
    /// Captured request budget.
    pub target_requests: Option<u64>,
    /// Captured duration in seconds.
    pub target_duration_secs: Option<u64>,
    /// Start timestamp in unix milliseconds.
    pub started_at: i64,
    /// Completion timestamp in unix milliseconds.
    pub completed_at: Option<i64>,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Error message for failed runs.
    pub error_message: Option<String>,
    /// Terminal aggregate when recorded.
    pub aggregate: Option<RunAggregate>,
}

/// A run joined with its originating endpoint and project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetail {
    /// The run record.
    pub run: Run,
    /// Originating endpoint when still present.
    pub endpoint: Option<Endpoint>,
    /// Owning project when still present.
    pub project: Option<Project>,
}

/// A run joined with its persisted snapshot timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTimeline {
    /// The run record.
    pub run: Run,
    /// Sampled snapshots ordered by arrival.
    pub snapshots: Vec<MetricSample>,
}

// ============================================================================
// SECTION: Metric Sample
// ============================================================================

/// Per-response metric record streamed to subscribers.
///
/// # Invariants
/// - `total_requests == successful_requests + failed_requests`.
/// - `is_success` iff `status_code` is in [200, 300).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    /// Run token the sample belongs to.
    pub run_token: RunToken,
    /// Sample timestamp in unix milliseconds.
    pub timestamp: i64,
    /// Elapsed milliseconds for this response (truncated toward zero).
    pub response_time_ms: u64,
    /// HTTP status code (503 for transport failures).
    pub status_code: u16,
    /// Whether the status code counts as a success.
    pub is_success: bool,
    /// Running total request count.
    pub total_requests: u64,
    /// Running successful request count.
    pub successful_requests: u64,
    /// Running failed request count.
    pub failed_requests: u64,
    /// Requests per second over the trailing one-second window.
    pub current_rps: f64,
    /// Running average response time in milliseconds.
    pub average_response_time: f64,
}

// ============================================================================
// SECTION: Aggregates
// ============================================================================

/// Per-status-code latency aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAggregate {
    /// Sample count for this status code.
    pub count: u64,
    /// Minimum response time in milliseconds.
    pub min_response_time: f64,
    /// Average response time in milliseconds.
    pub average_response_time: f64,
    /// Maximum response time in milliseconds.
    pub max_response_time: f64,
    /// 50th percentile response time.
    pub percentile50: f64,
    /// 75th percentile response time.
    pub percentile75: f64,
    /// 90th percentile response time.
    pub percentile90: f64,
    /// 95th percentile response time.
    pub percentile95: f64,
    /// 99th percentile response time.
    pub percentile99: f64,
}

impl From<LatencySummary> for StatusAggregate {
    fn from(summary: LatencySummary) -> Self {
        Self {
            count: summary.count,
            min_response_time: summary.min,
            average_response_time: summary.avg,
            max_response_time: summary.max,
            percentile50: summary.p50,
            percentile75: summary.p75,
            percentile90: summary.p90,
            percentile95: summary.p95,
            percentile99: summary.p99,
        }
    }
}

/// Terminal aggregate for a run.
///
/// # Invariants
/// - `requests_per_second` is the peak one-second windowed rate observed
///   during the run, not the run-average rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAggregate {
    /// Run token the aggregate belongs to.
    pub run_token: RunToken,
    /// Total requests issued.
    pub total_requests: u64,
    /// Requests with a status in [200, 300).
    pub successful_requests: u64,
    /// Requests outside [200, 300), including transport failures.
    pub failed_requests: u64,
    /// Peak windowed requests per second.
    pub requests_per_second: f64,
    /// Average response time in milliseconds.
    pub average_response_time: f64,
    /// Minimum response time in milliseconds.
    pub min_response_time: f64,
    /// Maximum response time in milliseconds.
    pub max_response_time: f64,
    /// 50th percentile response time.
    pub percentile50: f64,
    /// 75th percentile response time.
    pub percentile75: f64,
    /// 90th percentile response time.
    pub percentile90: f64,
    /// 95th percentile response time.
    pub percentile95: f64,
    /// 99th percentile response time.
    pub percentile99: f64,
    /// Total elapsed wall-clock time in milliseconds.
    pub total_elapsed_time: u64,
    /// Per-status-code breakdown.
    pub status_codes: BTreeMap<u16, StatusAggregate>,
}

impl RunAggregate {
    /// Returns an all-zero aggregate for a run with no samples.
    #[must_use]
    pub fn empty(run_token: RunToken, total_elapsed_time: u64) -> Self {
        Self {
            run_token,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            requests_per_second: 0.0,
            average_response_time: 0.0,
            min_response_time: 0.0,
            max_response_time: 0.0,
            percentile50: 0.0,
            percentile75: 0.0,
            percentile90: 0.0,
            percentile95: 0.0,
            percentile99: 0.0,
            total_elapsed_time,
            status_codes: BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Queries and Statistics
// ============================================================================

/// Filters and pagination for run searches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQuery {
    /// Restrict to runs of this endpoint.
    #[serde(default)]
    pub endpoint_id: Option<EndpointId>,
    /// Restrict to runs of endpoints in this project.
    #[serde(default)]
    pub project_id: Option<ProjectId>,
    /// Restrict to runs in this status.
    #[serde(default)]
    pub status: Option<RunStatus>,
    /// Inclusive lower bound on `started_at` (unix milliseconds).
    #[serde(default)]
    pub from: Option<i64>,
    /// Inclusive upper bound on `started_at` (unix milliseconds).
    #[serde(default)]
    pub to: Option<i64>,
    /// Maximum rows to return (store clamps zero to the default page size).
    #[serde(default)]
    pub limit: Option<u64>,
    /// Rows to skip before the first returned row.
    #[serde(default)]
    pub offset: Option<u64>,
}

/// Aggregate statistics over recorded runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatistics {
    /// Runs currently executing.
    pub running: u64,
    /// Runs that completed.
    pub completed: u64,
    /// Runs that failed.
    pub failed: u64,
    /// Runs that were cancelled.
    pub cancelled: u64,
    /// Total requests across all recorded runs.
    pub total_requests: u64,
    /// Mean of completed runs' average response times.
    pub average_response_time: f64,
    /// Mean of completed runs' peak RPS values.
    pub average_rps: f64,
}

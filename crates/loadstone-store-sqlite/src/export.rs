// crates/loadstone-store-sqlite/src/export.rs
// ============================================================================
// Module: Catalog Export and Import
// Description: Project archive serialization and atomic import.
// Purpose: Move a project with its endpoints and run history between hosts.
// Dependencies: loadstone-core, rusqlite, serde, serde_json, uuid
// ============================================================================

//! ## Overview
//! Export serializes a project, its endpoints, and every endpoint's run
//! history. Snapshots are ephemeral telemetry and are not exported. Import
//! applies the whole archive in one transaction: the project name gains an
//! " (Imported)" suffix, every run receives a fresh `imported-` token, and
//! any failure rolls the entire import back. Unknown fields in the payload
//! are ignored; a missing project name is an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use loadstone_core::AuthSpec;
use loadstone_core::HttpMethod;
use loadstone_core::Project;
use loadstone_core::ProjectId;
use loadstone_core::RunAggregate;
use loadstone_core::RunStatus;
use loadstone_core::unix_millis;
use rusqlite::params;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

use crate::store::CatalogStore;
use crate::store::StoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Archive format version.
const EXPORT_VERSION: &str = "1.0";
/// Suffix appended to imported project names.
const IMPORT_SUFFIX: &str = " (Imported)";
/// Prefix stamped onto imported run tokens.
const IMPORT_TOKEN_PREFIX: &str = "imported-";

// ============================================================================
// SECTION: Archive Types
// ============================================================================

/// Top-level project archive.
///
/// # Invariants
/// - `version` identifies the archive format, currently "1.0".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectExport {
    /// Archive format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Export timestamp in unix milliseconds.
    #[serde(default)]
    pub exported_at: i64,
    /// The exported project.
    pub project: ExportedProject,
}

/// Exported project with nested endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedProject {
    /// Project name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional project-wide auth spec.
    #[serde(default)]
    pub auth: Option<AuthSpec>,
    /// Endpoints with their run history.
    #[serde(default)]
    pub endpoints: Vec<ExportedEndpoint>,
}

/// Exported endpoint with its run history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedEndpoint {
    /// Endpoint name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Target URL.
    pub url: String,
    /// Target HTTP method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Default virtual user count.
    #[serde(default = "default_users")]
    pub users: u32,
    /// Default total request budget.
    #[serde(default)]
    pub requests: Option<u64>,
    /// Default wall-clock duration in seconds.
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// Content type for the request body.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,
    /// Skip TLS certificate verification when set.
    #[serde(default)]
    pub insecure_tls: bool,
    /// Run the token-fetch preflight when set.
    #[serde(default)]
    pub requires_auth: bool,
    /// Optional per-request headers.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Optional auth spec overriding the project's.
    #[serde(default)]
    pub auth: Option<AuthSpec>,
    /// Historical runs, full aggregates, no snapshots.
    #[serde(default)]
    pub executions: Vec<ExportedRun>,
}

/// Exported run record without snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedRun {
    /// Captured target URL.
    pub url: String,
    /// Captured HTTP method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Captured virtual user count.
    #[serde(default = "default_users")]
    pub users: u32,
    /// Captured request budget.
    #[serde(default)]
    pub target_requests: Option<u64>,
    /// Captured duration in seconds.
    #[serde(default)]
    pub target_duration_secs: Option<u64>,
    /// Start timestamp in unix milliseconds.
    pub started_at: i64,
    /// Completion timestamp in unix milliseconds.
    #[serde(default)]
    pub completed_at: Option<i64>,
    /// Terminal status label.
    pub status: RunStatus,
    /// Error message for failed runs.
    #[serde(default)]
    pub error_message: Option<String>,
    /// Terminal aggregate when recorded.
    #[serde(default)]
    pub aggregate: Option<RunAggregate>,
}

/// Returns the default virtual user count for archive payloads.
const fn default_users() -> u32 {
    10
}

/// Returns the archive version assumed when absent.
fn default_version() -> String {
    EXPORT_VERSION.to_string()
}

/// Returns the default content type for archive payloads.
fn default_content_type() -> String {
    "application/json".to_string()
}

// ============================================================================
// SECTION: Export
// ============================================================================

impl CatalogStore {
    /// Serializes a project, its endpoints, and their run history.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    pub fn export_project(&self, id: ProjectId) -> Result<ProjectExport, StoreError> {
        let project = self
            .get_project(id)?
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))?;
        let mut endpoints = Vec::new();
        for endpoint in self.list_endpoints(id)? {
            let runs = self.search_runs(&loadstone_core::RunQuery {
                endpoint_id: Some(endpoint.id),
                limit: Some(u64::MAX),
                ..loadstone_core::RunQuery::default()
            })?;
            let executions = runs
                .into_iter()
                .map(|run| ExportedRun {
                    url: run.url,
                    method: run.method,
                    users: run.users,
                    target_requests: run.target_requests,
                    target_duration_secs: run.target_duration_secs,
                    started_at: run.started_at,
                    completed_at: run.completed_at,
                    status: run.status,
                    error_message: run.error_message,
                    aggregate: run.aggregate,
                })
                .collect();
            endpoints.push(ExportedEndpoint {
                name: endpoint.name,
                description: endpoint.description,
                url: endpoint.url,
                method: endpoint.method,
                users: endpoint.users,
                requests: endpoint.requests,
                duration_secs: endpoint.duration_secs,
                content_type: endpoint.content_type,
                body: endpoint.body,
                insecure_tls: endpoint.insecure_tls,
                requires_auth: endpoint.requires_auth,
                headers: endpoint.headers,
                auth: endpoint.auth,
                executions,
            });
        }
        Ok(ProjectExport {
            version: EXPORT_VERSION.to_string(),
            exported_at: unix_millis(),
            project: ExportedProject {
                name: project.name,
                description: project.description,
                auth: project.auth,
                endpoints,
            },
        })
    }
}

// ============================================================================
// SECTION: Import
// ============================================================================

impl CatalogStore {
    /// Imports a project archive atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the payload is malformed (a
    /// missing project name in particular) and rolls back on any failure.
    pub fn import_project(&self, payload: &serde_json::Value) -> Result<Project, StoreError> {
        if payload
            .get("project")
            .and_then(|project| project.get("name"))
            .and_then(serde_json::Value::as_str)
            .is_none()
        {
            return Err(StoreError::Invalid("import payload missing project name".to_string()));
        }
        let archive: ProjectExport = serde_json::from_value(payload.clone())
            .map_err(|err| StoreError::Invalid(err.to_string()))?;

        let now = unix_millis();
        let name = format!("{}{IMPORT_SUFFIX}", archive.project.name);
        let project_auth_json = encode_json(archive.project.auth.as_ref())?;

        let mut guard = self.lock();
        let tx = guard.transaction()?;
        tx.execute(
            "INSERT INTO projects (name, description, auth_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![name, archive.project.description, project_auth_json, now, now],
        )?;
        let project_row_id = tx.last_insert_rowid();

        for endpoint in &archive.project.endpoints {
            let headers_json = encode_json(endpoint.headers.as_ref())?;
            let auth_json = encode_json(endpoint.auth.as_ref())?;
            tx.execute(
                "INSERT INTO endpoints (project_id, name, description, url, method, users,
                                        requests, duration_secs, content_type, body,
                                        insecure_tls, requires_auth, headers_json, auth_json)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    project_row_id,
                    endpoint.name,
                    endpoint.description,
                    endpoint.url,
                    endpoint.method.as_str(),
                    endpoint.users,
                    to_opt_i64(endpoint.requests)?,
                    to_opt_i64(endpoint.duration_secs)?,
                    endpoint.content_type,
                    endpoint.body,
                    endpoint.insecure_tls,
                    endpoint.requires_auth,
                    headers_json,
                    auth_json,
                ],
            )?;
            let endpoint_row_id = tx.last_insert_rowid();

            for run in &endpoint.executions {
                let token = format!("{IMPORT_TOKEN_PREFIX}{}", Uuid::new_v4());
                insert_exported_run(&tx, endpoint_row_id, &token, run)?;
            }
        }
        tx.commit()?;
        let project_id = ProjectId::from_raw(project_row_id)
            .ok_or_else(|| StoreError::Invalid(format!("invalid project id: {project_row_id}")))?;
        drop(guard);
        self.get_project(project_id)?
            .ok_or_else(|| StoreError::NotFound(format!("project {project_id}")))
    }
}

/// Inserts one exported run under the imported endpoint.
fn insert_exported_run(
    tx: &rusqlite::Transaction<'_>,
    endpoint_row_id: i64,
    token: &str,
    run: &ExportedRun,
) -> Result<(), StoreError> {
    let status_codes_json = run
        .aggregate
        .as_ref()
        .map(|aggregate| {
            serde_json::to_string(&aggregate.status_codes)
                .map_err(|err| StoreError::Invalid(err.to_string()))
        })
        .transpose()?;
    let aggregate = run.aggregate.as_ref();
    tx.execute(
        "INSERT INTO runs (token, endpoint_id, url, method, users, target_requests,
                           target_duration_secs, started_at, completed_at, status,
                           error_message, total_requests, successful_requests,
                           failed_requests, requests_per_second, average_response_time,
                           min_response_time, max_response_time, percentile50, percentile75,
                           percentile90, percentile95, percentile99, total_elapsed_time,
                           status_codes_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25)",
        params![
            token,
            endpoint_row_id,
            run.url,
            run.method.as_str(),
            run.users,
            to_opt_i64(run.target_requests)?,
            to_opt_i64(run.target_duration_secs)?,
            run.started_at,
            run.completed_at,
            run.status.as_str(),
            run.error_message,
            aggregate.map(|a| to_count(a.total_requests)).transpose()?,
            aggregate.map(|a| to_count(a.successful_requests)).transpose()?,
            aggregate.map(|a| to_count(a.failed_requests)).transpose()?,
            aggregate.map(|a| a.requests_per_second),
            aggregate.map(|a| a.average_response_time),
            aggregate.map(|a| a.min_response_time),
            aggregate.map(|a| a.max_response_time),
            aggregate.map(|a| a.percentile50),
            aggregate.map(|a| a.percentile75),
            aggregate.map(|a| a.percentile90),
            aggregate.map(|a| a.percentile95),
            aggregate.map(|a| a.percentile99),
            aggregate.map(|a| to_count(a.total_elapsed_time)).transpose()?,
            status_codes_json,
        ],
    )?;
    Ok(())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Encodes an optional serializable value as a JSON column value.
fn encode_json<T: Serialize>(value: Option<&T>) -> Result<Option<String>, StoreError> {
    value
        .map(|value| {
            serde_json::to_string(value).map_err(|err| StoreError::Invalid(err.to_string()))
        })
        .transpose()
}

/// Converts an optional unsigned count into a nullable column value.
fn to_opt_i64(value: Option<u64>) -> Result<Option<i64>, StoreError> {
    value
        .map(|value| {
            i64::try_from(value)
                .map_err(|_| StoreError::Invalid(format!("count exceeds storage range: {value}")))
        })
        .transpose()
}

/// Converts an unsigned count into a column value.
fn to_count(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Invalid(format!("count exceeds storage range: {value}")))
}

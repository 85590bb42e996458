// crates/loadstone-server/src/handlers.rs
// ============================================================================
// Module: HTTP Handlers
// Description: REST bindings for the Loadstone operation set.
// Purpose: Translate HTTP requests into facade calls and typed errors.
// Dependencies: axum, loadstone-core, loadstone-runtime, serde, serde_json
// ============================================================================

//! ## Overview
//! Thin handlers: extract, call the coordinator or store, map errors onto
//! HTTP statuses. Run-control conflicts surface as 409, lookup misses as
//! 404, validation failures as 400.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Json;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use loadstone_core::AuthSpec;
use loadstone_core::Endpoint;
use loadstone_core::EndpointId;
use loadstone_core::EndpointSpec;
use loadstone_core::NewProject;
use loadstone_core::Project;
use loadstone_core::ProjectId;
use loadstone_core::ProjectUpdate;
use loadstone_core::Run;
use loadstone_core::RunDetail;
use loadstone_core::RunId;
use loadstone_core::RunQuery;
use loadstone_core::RunRequest;
use loadstone_core::RunStatistics;
use loadstone_core::RunTimeline;
use loadstone_runtime::ProjectExport;
use loadstone_runtime::RunCoordinator;
use loadstone_runtime::StartError;
use loadstone_runtime::StoreError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: State and Errors
// ============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The facade every route binds to.
    pub coordinator: Arc<RunCoordinator>,
}

/// HTTP-mapped API error.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    status: StatusCode,
    /// Error message returned to the client.
    message: String,
}

impl ApiError {
    /// Builds an error with an explicit status.
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// 400 with a message.
    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 404 with a message.
    fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        match &error {
            StoreError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, error.to_string()),
            StoreError::Invalid(_) => Self::new(StatusCode::BAD_REQUEST, error.to_string()),
            StoreError::Db(_) | StoreError::Io(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        }
    }
}

impl From<StartError> for ApiError {
    fn from(error: StartError) -> Self {
        match error {
            StartError::RunInProgress => Self::new(StatusCode::CONFLICT, error.to_string()),
            StartError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, error.to_string()),
            StartError::Validation(_) => Self::new(StatusCode::BAD_REQUEST, error.to_string()),
            StartError::Store(store) => store.into(),
        }
    }
}

// ============================================================================
// SECTION: Run Control
// ============================================================================

/// Optional parameters for an endpoint run start.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunParams {
    /// Overrides the endpoint's default user count.
    #[serde(default)]
    pub users: Option<u32>,
}

/// Token payload returned by run starts.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStarted {
    /// Token of the admitted run.
    pub run_token: String,
}

/// Starts a run for a stored endpoint.
pub async fn start_endpoint_run(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<StartRunParams>,
) -> Result<Json<RunStarted>, ApiError> {
    let endpoint_id = parse_endpoint_id(id)?;
    let token = state.coordinator.start_endpoint_run(endpoint_id, params.users)?;
    Ok(Json(RunStarted {
        run_token: token.as_str().to_string(),
    }))
}

/// Starts an ad-hoc run from an inline request.
pub async fn start_ad_hoc_run(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Json<RunStarted>, ApiError> {
    let token = state.coordinator.start_ad_hoc_run(&request)?;
    Ok(Json(RunStarted {
        run_token: token.as_str().to_string(),
    }))
}

/// Cancels the active run; succeeds when idle.
pub async fn stop_run(State(state): State<AppState>) -> Json<Value> {
    state.coordinator.stop();
    Json(json!({ "stopped": true }))
}

/// Reports whether a run currently holds the active slot.
pub async fn active_run(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "running": state.coordinator.is_running() }))
}

/// Payload for a one-off auth test.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestAuthRequest {
    /// Auth spec to exercise.
    pub auth: AuthSpec,
    /// Skip TLS certificate verification when set.
    #[serde(default)]
    pub insecure_tls: bool,
}

/// Runs a token fetch without starting a run.
pub async fn test_auth(
    State(state): State<AppState>,
    Json(request): Json<TestAuthRequest>,
) -> Json<Value> {
    match state.coordinator.test_auth(&request.auth, request.insecure_tls) {
        Ok(token) => Json(json!({ "ok": true, "token": token.value })),
        Err(err) => Json(json!({ "ok": false, "error": err.to_string() })),
    }
}

// ============================================================================
// SECTION: Projects
// ============================================================================

/// Lists all projects.
pub async fn list_projects(State(state): State<AppState>) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.coordinator.store().list_projects()?))
}

/// Creates a project.
pub async fn create_project(
    State(state): State<AppState>,
    Json(new): Json<NewProject>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.coordinator.store().create_project(&new)?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// Returns a project by id.
pub async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    let id = parse_project_id(id)?;
    state
        .coordinator
        .store()
        .get_project(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("project {id}")))
}

/// Updates a project's basics.
pub async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(update): Json<ProjectUpdate>,
) -> Result<Json<Project>, ApiError> {
    let id = parse_project_id(id)?;
    Ok(Json(state.coordinator.store().update_project(id, &update)?))
}

/// Deletes a project and its endpoints.
pub async fn delete_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let id = parse_project_id(id)?;
    state.coordinator.store().delete_project(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Sets a project's auth spec.
pub async fn set_project_auth(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(auth): Json<AuthSpec>,
) -> Result<StatusCode, ApiError> {
    let id = parse_project_id(id)?;
    state.coordinator.store().set_project_auth(id, &auth)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Clears a project's auth spec.
pub async fn clear_project_auth(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let id = parse_project_id(id)?;
    state.coordinator.store().clear_project_auth(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Serializes a project archive.
pub async fn export_project(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProjectExport>, ApiError> {
    let id = parse_project_id(id)?;
    Ok(Json(state.coordinator.store().export_project(id)?))
}

/// Imports a project archive atomically.
pub async fn import_project(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = state.coordinator.store().import_project(&payload)?;
    Ok((StatusCode::CREATED, Json(project)))
}

// ============================================================================
// SECTION: Endpoints
// ============================================================================

/// Lists a project's endpoints.
pub async fn list_endpoints(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Endpoint>>, ApiError> {
    let id = parse_project_id(id)?;
    Ok(Json(state.coordinator.store().list_endpoints(id)?))
}

/// Creates an endpoint under a project.
pub async fn create_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(spec): Json<EndpointSpec>,
) -> Result<(StatusCode, Json<Endpoint>), ApiError> {
    let id = parse_project_id(id)?;
    let endpoint = state.coordinator.store().create_endpoint(id, &spec)?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// Returns an endpoint by id.
pub async fn get_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Endpoint>, ApiError> {
    let id = parse_endpoint_id(id)?;
    state
        .coordinator
        .store()
        .get_endpoint(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("endpoint {id}")))
}

/// Updates an endpoint.
pub async fn update_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(spec): Json<EndpointSpec>,
) -> Result<Json<Endpoint>, ApiError> {
    let id = parse_endpoint_id(id)?;
    Ok(Json(state.coordinator.store().update_endpoint(id, &spec)?))
}

/// Deletes an endpoint.
pub async fn delete_endpoint(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let id = parse_endpoint_id(id)?;
    state.coordinator.store().delete_endpoint(id)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// SECTION: Runs and Statistics
// ============================================================================

/// Searches runs with filters and pagination.
pub async fn search_runs(
    State(state): State<AppState>,
    Query(query): Query<RunQuery>,
) -> Result<Json<Vec<Run>>, ApiError> {
    Ok(Json(state.coordinator.store().search_runs(&query)?))
}

/// Parameters for the recent-runs listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentParams {
    /// Maximum rows to return.
    #[serde(default = "default_recent_limit")]
    pub limit: u64,
}

/// Returns the default recent-runs page size.
const fn default_recent_limit() -> u64 {
    20
}

/// Lists the most recent runs.
pub async fn recent_runs(
    State(state): State<AppState>,
    Query(params): Query<RecentParams>,
) -> Result<Json<Vec<Run>>, ApiError> {
    Ok(Json(state.coordinator.store().list_recent_runs(params.limit)?))
}

/// Returns a run joined with its endpoint and project.
pub async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RunDetail>, ApiError> {
    let id = parse_run_id(id)?;
    state
        .coordinator
        .store()
        .get_run_detail(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("run {id}")))
}

/// Returns a run with its persisted snapshot timeline.
pub async fn run_timeline(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RunTimeline>, ApiError> {
    let id = parse_run_id(id)?;
    state
        .coordinator
        .store()
        .get_run_timeline(id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("run {id}")))
}

/// Deletes a run and its snapshots.
pub async fn delete_run(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let id = parse_run_id(id)?;
    state.coordinator.store().delete_run(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Filters for the statistics endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsParams {
    /// Restrict to one project.
    #[serde(default)]
    pub project_id: Option<i64>,
    /// Restrict to one endpoint.
    #[serde(default)]
    pub endpoint_id: Option<i64>,
}

/// Aggregates run totals.
pub async fn run_statistics(
    State(state): State<AppState>,
    Query(params): Query<StatisticsParams>,
) -> Result<Json<RunStatistics>, ApiError> {
    let project_id = params.project_id.map(parse_project_id).transpose()?;
    let endpoint_id = params.endpoint_id.map(parse_endpoint_id).transpose()?;
    Ok(Json(state.coordinator.store().run_statistics(project_id, endpoint_id)?))
}

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses a project path parameter.
fn parse_project_id(raw: i64) -> Result<ProjectId, ApiError> {
    ProjectId::from_raw(raw).ok_or_else(|| ApiError::bad_request(format!("invalid project id: {raw}")))
}

/// Parses an endpoint path parameter.
fn parse_endpoint_id(raw: i64) -> Result<EndpointId, ApiError> {
    EndpointId::from_raw(raw)
        .ok_or_else(|| ApiError::bad_request(format!("invalid endpoint id: {raw}")))
}

/// Parses a run path parameter.
fn parse_run_id(raw: i64) -> Result<RunId, ApiError> {
    RunId::from_raw(raw).ok_or_else(|| ApiError::bad_request(format!("invalid run id: {raw}")))
}

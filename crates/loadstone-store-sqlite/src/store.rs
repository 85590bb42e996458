// crates/loadstone-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Catalog Store
// Description: Persistent projects, endpoints, runs, and snapshot timelines.
// Purpose: Serialize catalog access through one guarded connection.
// Dependencies: loadstone-core, rusqlite, serde, serde_json, thiserror, uuid
// ============================================================================

//! ## Overview
//! This module implements the durable catalog over `SQLite`. Projects cascade
//! to their endpoints on delete; runs keep history with a cleared endpoint
//! link; snapshots cascade with their run. Writes during a run (snapshot
//! appends) and writes at run boundaries share the same serialized
//! connection, which is sufficient for a single-host, single-active-run
//! deployment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use loadstone_core::AuthSpec;
use loadstone_core::Endpoint;
use loadstone_core::EndpointId;
use loadstone_core::EndpointSpec;
use loadstone_core::HttpMethod;
use loadstone_core::MetricSample;
use loadstone_core::NewProject;
use loadstone_core::Project;
use loadstone_core::ProjectId;
use loadstone_core::ProjectUpdate;
use loadstone_core::Run;
use loadstone_core::RunAggregate;
use loadstone_core::RunDetail;
use loadstone_core::RunId;
use loadstone_core::RunQuery;
use loadstone_core::RunRequest;
use loadstone_core::RunStatistics;
use loadstone_core::RunStatus;
use loadstone_core::RunTimeline;
use loadstone_core::RunToken;
use loadstone_core::StatusAggregate;
use loadstone_core::unix_millis;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::params_from_iter;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default page size for run searches.
const DEFAULT_SEARCH_LIMIT: u64 = 50;
/// Column list shared by every run query.
const RUN_COLUMNS: &str = "id, token, endpoint_id, url, method, users, target_requests, \
                           target_duration_secs, started_at, completed_at, status, \
                           error_message, total_requests, successful_requests, \
                           failed_requests, requests_per_second, average_response_time, \
                           min_response_time, max_response_time, percentile50, percentile75, \
                           percentile90, percentile95, percentile99, total_elapsed_time, \
                           status_codes_json";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the catalog store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl CatalogStoreConfig {
    /// Creates a config with default pragmas for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Catalog store errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("store db error: {0}")]
    Db(String),
    /// Invalid stored or supplied data.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed catalog store.
///
/// # Invariants
/// - All access is serialized through one mutex-guarded connection.
/// - Foreign keys are enforced; deletes cascade per the ownership model.
#[derive(Clone)]
pub struct CatalogStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl CatalogStore {
    /// Opens (or creates) a catalog store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(config: &CatalogStoreConfig) -> Result<Self, StoreError> {
        ensure_parent_dir(&config.path)?;
        let connection = Connection::open(&config.path)?;
        apply_pragmas(&connection, config)?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Opens an in-memory store, used by the one-shot CLI mode and tests.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when initialization fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let connection = Connection::open_in_memory()?;
        connection.pragma_update(None, "foreign_keys", "on")?;
        initialize_schema(&connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates the parent directory of the database path when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Applies connection pragmas from the store config.
fn apply_pragmas(connection: &Connection, config: &CatalogStoreConfig) -> Result<(), StoreError> {
    connection.pragma_update(None, "busy_timeout", config.busy_timeout_ms)?;
    // journal_mode returns the resulting mode as a row.
    connection.query_row(
        &format!("PRAGMA journal_mode = {}", config.journal_mode.pragma_value()),
        [],
        |_row| Ok(()),
    )?;
    connection.pragma_update(None, "synchronous", config.sync_mode.pragma_value())?;
    connection.pragma_update(None, "foreign_keys", "on")?;
    Ok(())
}

/// Creates the catalog schema when missing.
fn initialize_schema(connection: &Connection) -> Result<(), StoreError> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS projects (
             id          INTEGER PRIMARY KEY,
             name        TEXT NOT NULL,
             description TEXT,
             auth_json   TEXT,
             created_at  INTEGER NOT NULL,
             updated_at  INTEGER NOT NULL
         );
         CREATE TABLE IF NOT EXISTS endpoints (
             id            INTEGER PRIMARY KEY,
             project_id    INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
             name          TEXT NOT NULL,
             description   TEXT,
             url           TEXT NOT NULL,
             method        TEXT NOT NULL,
             users         INTEGER NOT NULL,
             requests      INTEGER,
             duration_secs INTEGER,
             content_type  TEXT NOT NULL,
             body          TEXT,
             insecure_tls  INTEGER NOT NULL DEFAULT 0,
             requires_auth INTEGER NOT NULL DEFAULT 0,
             headers_json  TEXT,
             auth_json     TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_endpoints_project ON endpoints(project_id);
         CREATE TABLE IF NOT EXISTS runs (
             id                    INTEGER PRIMARY KEY,
             token                 TEXT NOT NULL UNIQUE,
             endpoint_id           INTEGER REFERENCES endpoints(id) ON DELETE SET NULL,
             url                   TEXT NOT NULL,
             method                TEXT NOT NULL,
             users                 INTEGER NOT NULL,
             target_requests       INTEGER,
             target_duration_secs  INTEGER,
             started_at            INTEGER NOT NULL,
             completed_at          INTEGER,
             status                TEXT NOT NULL,
             error_message         TEXT,
             total_requests        INTEGER,
             successful_requests   INTEGER,
             failed_requests       INTEGER,
             requests_per_second   REAL,
             average_response_time REAL,
             min_response_time     REAL,
             max_response_time     REAL,
             percentile50          REAL,
             percentile75          REAL,
             percentile90          REAL,
             percentile95          REAL,
             percentile99          REAL,
             total_elapsed_time    INTEGER,
             status_codes_json     TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_runs_endpoint ON runs(endpoint_id);
         CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
         CREATE TABLE IF NOT EXISTS run_snapshots (
             id                    INTEGER PRIMARY KEY,
             run_id                INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
             timestamp             INTEGER NOT NULL,
             response_time_ms      INTEGER NOT NULL,
             status_code           INTEGER NOT NULL,
             total_requests        INTEGER NOT NULL,
             successful_requests   INTEGER NOT NULL,
             failed_requests       INTEGER NOT NULL,
             current_rps           REAL NOT NULL,
             average_response_time REAL NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_snapshots_run ON run_snapshots(run_id);",
    )?;
    Ok(())
}

// ============================================================================
// SECTION: Projects
// ============================================================================

impl CatalogStore {
    /// Creates a project.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    pub fn create_project(&self, new: &NewProject) -> Result<Project, StoreError> {
        let now = unix_millis();
        let auth_json = encode_auth(new.auth.as_ref())?;
        let guard = self.lock();
        guard.execute(
            "INSERT INTO projects (name, description, auth_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new.name, new.description, auth_json, now, now],
        )?;
        let id = guard.last_insert_rowid();
        drop(guard);
        Ok(Project {
            id: project_id(id)?,
            name: new.name.clone(),
            description: new.description.clone(),
            auth: new.auth.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Lists all projects, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        let guard = self.lock();
        let mut stmt = guard.prepare(
            "SELECT id, name, description, auth_json, created_at, updated_at
             FROM projects ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], project_row)?;
        let mut projects = Vec::new();
        for row in rows {
            projects.push(project_from_row(row?)?);
        }
        Ok(projects)
    }

    /// Returns a project by id, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn get_project(&self, id: ProjectId) -> Result<Option<Project>, StoreError> {
        let guard = self.lock();
        let row = guard
            .query_row(
                "SELECT id, name, description, auth_json, created_at, updated_at
                 FROM projects WHERE id = ?1",
                params![id.get()],
                project_row,
            )
            .optional()?;
        drop(guard);
        row.map(project_from_row).transpose()
    }

    /// Updates a project's name and description.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    pub fn update_project(
        &self,
        id: ProjectId,
        update: &ProjectUpdate,
    ) -> Result<Project, StoreError> {
        let now = unix_millis();
        let guard = self.lock();
        let affected = guard.execute(
            "UPDATE projects SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![update.name, update.description, now, id.get()],
        )?;
        drop(guard);
        if affected == 0 {
            return Err(StoreError::NotFound(format!("project {id}")));
        }
        self.get_project(id)?
            .ok_or_else(|| StoreError::NotFound(format!("project {id}")))
    }

    /// Sets a project's auth spec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    pub fn set_project_auth(&self, id: ProjectId, auth: &AuthSpec) -> Result<(), StoreError> {
        let auth_json = encode_auth(Some(auth))?;
        self.write_project_auth(id, auth_json)
    }

    /// Clears a project's auth spec.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    pub fn clear_project_auth(&self, id: ProjectId) -> Result<(), StoreError> {
        self.write_project_auth(id, None)
    }

    /// Writes the auth column and refreshes `updated_at`.
    fn write_project_auth(
        &self,
        id: ProjectId,
        auth_json: Option<String>,
    ) -> Result<(), StoreError> {
        let now = unix_millis();
        let guard = self.lock();
        let affected = guard.execute(
            "UPDATE projects SET auth_json = ?1, updated_at = ?2 WHERE id = ?3",
            params![auth_json, now, id.get()],
        )?;
        drop(guard);
        if affected == 0 {
            return Err(StoreError::NotFound(format!("project {id}")));
        }
        Ok(())
    }

    /// Deletes a project and, by cascade, its endpoints. Recorded runs keep
    /// their history with the endpoint link cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    pub fn delete_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let guard = self.lock();
        let affected = guard.execute("DELETE FROM projects WHERE id = ?1", params![id.get()])?;
        drop(guard);
        if affected == 0 {
            return Err(StoreError::NotFound(format!("project {id}")));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Endpoints
// ============================================================================

impl CatalogStore {
    /// Creates an endpoint and refreshes the owning project's `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the project does not exist.
    pub fn create_endpoint(
        &self,
        project_id: ProjectId,
        spec: &EndpointSpec,
    ) -> Result<Endpoint, StoreError> {
        ensure_stop_exclusivity(spec)?;
        let headers_json = encode_headers(spec.headers.as_ref())?;
        let auth_json = encode_auth(spec.auth.as_ref())?;
        let now = unix_millis();
        let guard = self.lock();
        let project_exists: Option<i64> = guard
            .query_row(
                "SELECT id FROM projects WHERE id = ?1",
                params![project_id.get()],
                |row| row.get(0),
            )
            .optional()?;
        if project_exists.is_none() {
            return Err(StoreError::NotFound(format!("project {project_id}")));
        }
        guard.execute(
            "INSERT INTO endpoints (project_id, name, description, url, method, users, requests,
                                    duration_secs, content_type, body, insecure_tls,
                                    requires_auth, headers_json, auth_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                project_id.get(),
                spec.name,
                spec.description,
                spec.url,
                spec.method.as_str(),
                spec.users,
                opt_i64(spec.requests)?,
                opt_i64(spec.duration_secs)?,
                spec.content_type,
                spec.body,
                spec.insecure_tls,
                spec.requires_auth,
                headers_json,
                auth_json,
            ],
        )?;
        let id = guard.last_insert_rowid();
        guard.execute(
            "UPDATE projects SET updated_at = ?1 WHERE id = ?2",
            params![now, project_id.get()],
        )?;
        drop(guard);
        Ok(Endpoint {
            id: endpoint_id(id)?,
            project_id,
            name: spec.name.clone(),
            description: spec.description.clone(),
            url: spec.url.clone(),
            method: spec.method,
            users: spec.users,
            requests: spec.requests,
            duration_secs: spec.duration_secs,
            content_type: spec.content_type.clone(),
            body: spec.body.clone(),
            insecure_tls: spec.insecure_tls,
            requires_auth: spec.requires_auth,
            headers: spec.headers.clone(),
            auth: spec.auth.clone(),
        })
    }

    /// Lists a project's endpoints ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn list_endpoints(&self, project_id: ProjectId) -> Result<Vec<Endpoint>, StoreError> {
        let guard = self.lock();
        let mut stmt = guard.prepare(
            "SELECT id, project_id, name, description, url, method, users, requests,
                    duration_secs, content_type, body, insecure_tls, requires_auth,
                    headers_json, auth_json
             FROM endpoints WHERE project_id = ?1 ORDER BY name",
        )?;
        let rows = stmt.query_map(params![project_id.get()], endpoint_row)?;
        let mut endpoints = Vec::new();
        for row in rows {
            endpoints.push(endpoint_from_row(row?)?);
        }
        Ok(endpoints)
    }

    /// Returns an endpoint by id, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn get_endpoint(&self, id: EndpointId) -> Result<Option<Endpoint>, StoreError> {
        let guard = self.lock();
        let row = guard
            .query_row(
                "SELECT id, project_id, name, description, url, method, users, requests,
                        duration_secs, content_type, body, insecure_tls, requires_auth,
                        headers_json, auth_json
                 FROM endpoints WHERE id = ?1",
                params![id.get()],
                endpoint_row,
            )
            .optional()?;
        drop(guard);
        row.map(endpoint_from_row).transpose()
    }

    /// Updates an endpoint and refreshes the owning project's `updated_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the endpoint does not exist.
    pub fn update_endpoint(
        &self,
        id: EndpointId,
        spec: &EndpointSpec,
    ) -> Result<Endpoint, StoreError> {
        ensure_stop_exclusivity(spec)?;
        let headers_json = encode_headers(spec.headers.as_ref())?;
        let auth_json = encode_auth(spec.auth.as_ref())?;
        let now = unix_millis();
        let guard = self.lock();
        let affected = guard.execute(
            "UPDATE endpoints SET name = ?1, description = ?2, url = ?3, method = ?4,
                                  users = ?5, requests = ?6, duration_secs = ?7,
                                  content_type = ?8, body = ?9, insecure_tls = ?10,
                                  requires_auth = ?11, headers_json = ?12, auth_json = ?13
             WHERE id = ?14",
            params![
                spec.name,
                spec.description,
                spec.url,
                spec.method.as_str(),
                spec.users,
                opt_i64(spec.requests)?,
                opt_i64(spec.duration_secs)?,
                spec.content_type,
                spec.body,
                spec.insecure_tls,
                spec.requires_auth,
                headers_json,
                auth_json,
                id.get(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound(format!("endpoint {id}")));
        }
        guard.execute(
            "UPDATE projects SET updated_at = ?1
             WHERE id = (SELECT project_id FROM endpoints WHERE id = ?2)",
            params![now, id.get()],
        )?;
        drop(guard);
        self.get_endpoint(id)?
            .ok_or_else(|| StoreError::NotFound(format!("endpoint {id}")))
    }

    /// Deletes an endpoint. Runs referencing it keep their history with the
    /// link cleared.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the endpoint does not exist.
    pub fn delete_endpoint(&self, id: EndpointId) -> Result<(), StoreError> {
        let guard = self.lock();
        let affected = guard.execute("DELETE FROM endpoints WHERE id = ?1", params![id.get()])?;
        drop(guard);
        if affected == 0 {
            return Err(StoreError::NotFound(format!("endpoint {id}")));
        }
        Ok(())
    }
}

/// Rejects endpoint specs carrying both a budget and a duration.
fn ensure_stop_exclusivity(spec: &EndpointSpec) -> Result<(), StoreError> {
    if spec.requests.is_some() && spec.duration_secs.is_some() {
        return Err(StoreError::Invalid(
            "request budget and duration are mutually exclusive".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Runs
// ============================================================================

impl CatalogStore {
    /// Opens a run for an endpoint, capturing its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    pub fn create_run_for_endpoint(
        &self,
        endpoint: &Endpoint,
        users_override: Option<u32>,
    ) -> Result<Run, StoreError> {
        self.insert_run(
            RunToken::new(Uuid::new_v4().to_string()),
            Some(endpoint.id),
            &endpoint.url,
            endpoint.method,
            users_override.unwrap_or(endpoint.users),
            endpoint.requests,
            endpoint.duration_secs,
        )
    }

    /// Opens a run for an ad-hoc request.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    pub fn create_ad_hoc_run(&self, request: &RunRequest) -> Result<Run, StoreError> {
        self.insert_run(
            RunToken::new(Uuid::new_v4().to_string()),
            None,
            &request.url,
            request.method,
            request.users,
            request.requests,
            request.duration_secs,
        )
    }

    /// Inserts a run row with status `Running`.
    #[allow(clippy::too_many_arguments, reason = "Captured run configuration is flat.")]
    fn insert_run(
        &self,
        token: RunToken,
        endpoint_id: Option<EndpointId>,
        url: &str,
        method: HttpMethod,
        users: u32,
        target_requests: Option<u64>,
        target_duration_secs: Option<u64>,
    ) -> Result<Run, StoreError> {
        let started_at = unix_millis();
        let guard = self.lock();
        guard.execute(
            "INSERT INTO runs (token, endpoint_id, url, method, users, target_requests,
                               target_duration_secs, started_at, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                token.as_str(),
                endpoint_id.map(EndpointId::get),
                url,
                method.as_str(),
                users,
                opt_i64(target_requests)?,
                opt_i64(target_duration_secs)?,
                started_at,
                RunStatus::Running.as_str(),
            ],
        )?;
        let id = guard.last_insert_rowid();
        drop(guard);
        Ok(Run {
            id: run_id(id)?,
            token,
            endpoint_id,
            url: url.to_string(),
            method,
            users,
            target_requests,
            target_duration_secs,
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            error_message: None,
            aggregate: None,
        })
    }

    /// Returns a run by token, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn get_run_by_token(&self, token: &RunToken) -> Result<Option<Run>, StoreError> {
        let guard = self.lock();
        let row = guard
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE token = ?1"),
                params![token.as_str()],
                run_row,
            )
            .optional()?;
        drop(guard);
        row.map(run_from_row).transpose()
    }

    /// Returns a run by id, or `None` when absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn get_run(&self, id: RunId) -> Result<Option<Run>, StoreError> {
        let guard = self.lock();
        let row = guard
            .query_row(
                &format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?1"),
                params![id.get()],
                run_row,
            )
            .optional()?;
        drop(guard);
        row.map(run_from_row).transpose()
    }

    /// Returns a run joined with its endpoint and project when still present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a query fails.
    pub fn get_run_detail(&self, id: RunId) -> Result<Option<RunDetail>, StoreError> {
        let Some(run) = self.get_run(id)? else {
            return Ok(None);
        };
        let endpoint = match run.endpoint_id {
            Some(endpoint_id) => self.get_endpoint(endpoint_id)?,
            None => None,
        };
        let project = match &endpoint {
            Some(endpoint) => self.get_project(endpoint.project_id)?,
            None => None,
        };
        Ok(Some(RunDetail {
            run,
            endpoint,
            project,
        }))
    }

    /// Returns a run joined with its persisted snapshot timeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a query fails.
    pub fn get_run_timeline(&self, id: RunId) -> Result<Option<RunTimeline>, StoreError> {
        let Some(run) = self.get_run(id)? else {
            return Ok(None);
        };
        let guard = self.lock();
        let mut stmt = guard.prepare(
            "SELECT timestamp, response_time_ms, status_code, total_requests,
                    successful_requests, failed_requests, current_rps, average_response_time
             FROM run_snapshots WHERE run_id = ?1 ORDER BY id",
        )?;
        let token = run.token.clone();
        let rows = stmt.query_map(params![id.get()], |row| {
            Ok(MetricSample {
                run_token: token.clone(),
                timestamp: row.get(0)?,
                response_time_ms: row.get::<_, i64>(1)?.max(0).unsigned_abs(),
                status_code: row.get::<_, i64>(2)?.clamp(0, i64::from(u16::MAX)) as u16,
                is_success: (200 .. 300).contains(&row.get::<_, i64>(2)?),
                total_requests: row.get::<_, i64>(3)?.max(0).unsigned_abs(),
                successful_requests: row.get::<_, i64>(4)?.max(0).unsigned_abs(),
                failed_requests: row.get::<_, i64>(5)?.max(0).unsigned_abs(),
                current_rps: row.get(6)?,
                average_response_time: row.get(7)?,
            })
        })?;
        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        drop(stmt);
        drop(guard);
        Ok(Some(RunTimeline {
            run,
            snapshots,
        }))
    }

    /// Marks a run `Completed` and records its aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the token is unknown.
    pub fn complete_run(
        &self,
        token: &RunToken,
        aggregate: &RunAggregate,
    ) -> Result<(), StoreError> {
        self.finish_run(token, RunStatus::Completed, Some(aggregate), None)
    }

    /// Marks a run `Cancelled` with the aggregate of samples collected so far.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the token is unknown.
    pub fn cancel_run(&self, token: &RunToken, aggregate: &RunAggregate) -> Result<(), StoreError> {
        self.finish_run(token, RunStatus::Cancelled, Some(aggregate), None)
    }

    /// Marks a run `Failed` with an error message.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the token is unknown.
    pub fn fail_run(&self, token: &RunToken, error_message: &str) -> Result<(), StoreError> {
        self.finish_run(token, RunStatus::Failed, None, Some(error_message))
    }

    /// Applies a terminal status, completion time, and optional aggregate.
    fn finish_run(
        &self,
        token: &RunToken,
        status: RunStatus,
        aggregate: Option<&RunAggregate>,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        let completed_at = unix_millis();
        let status_codes_json = aggregate
            .map(|aggregate| {
                serde_json::to_string(&aggregate.status_codes)
                    .map_err(|err| StoreError::Invalid(err.to_string()))
            })
            .transpose()?;
        let guard = self.lock();
        let affected = guard.execute(
            "UPDATE runs SET status = ?1, completed_at = ?2, error_message = ?3,
                             total_requests = ?4, successful_requests = ?5,
                             failed_requests = ?6, requests_per_second = ?7,
                             average_response_time = ?8, min_response_time = ?9,
                             max_response_time = ?10, percentile50 = ?11, percentile75 = ?12,
                             percentile90 = ?13, percentile95 = ?14, percentile99 = ?15,
                             total_elapsed_time = ?16, status_codes_json = ?17
             WHERE token = ?18",
            params![
                status.as_str(),
                completed_at,
                error_message,
                aggregate.map(|a| opt_run_count(a.total_requests)).transpose()?,
                aggregate.map(|a| opt_run_count(a.successful_requests)).transpose()?,
                aggregate.map(|a| opt_run_count(a.failed_requests)).transpose()?,
                aggregate.map(|a| a.requests_per_second),
                aggregate.map(|a| a.average_response_time),
                aggregate.map(|a| a.min_response_time),
                aggregate.map(|a| a.max_response_time),
                aggregate.map(|a| a.percentile50),
                aggregate.map(|a| a.percentile75),
                aggregate.map(|a| a.percentile90),
                aggregate.map(|a| a.percentile95),
                aggregate.map(|a| a.percentile99),
                aggregate.map(|a| opt_run_count(a.total_elapsed_time)).transpose()?,
                status_codes_json,
                token.as_str(),
            ],
        )?;
        drop(guard);
        if affected == 0 {
            return Err(StoreError::NotFound(format!("run {token}")));
        }
        Ok(())
    }

    /// Lists the most recent runs by start time.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn list_recent_runs(&self, limit: u64) -> Result<Vec<Run>, StoreError> {
        let guard = self.lock();
        let mut stmt = guard.prepare(&format!(
            "SELECT {RUN_COLUMNS} FROM runs ORDER BY started_at DESC, id DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], run_row)?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(run_from_row(row?)?);
        }
        Ok(runs)
    }

    /// Searches runs with filters and pagination, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn search_runs(&self, query: &RunQuery) -> Result<Vec<Run>, StoreError> {
        let mut sql = format!("SELECT {RUN_COLUMNS} FROM runs WHERE 1 = 1");
        let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(endpoint_id) = query.endpoint_id {
            sql.push_str(&format!(" AND endpoint_id = ?{}", values.len() + 1));
            values.push(Box::new(endpoint_id.get()));
        }
        if let Some(project_id) = query.project_id {
            sql.push_str(&format!(
                " AND endpoint_id IN (SELECT id FROM endpoints WHERE project_id = ?{})",
                values.len() + 1
            ));
            values.push(Box::new(project_id.get()));
        }
        if let Some(status) = query.status {
            sql.push_str(&format!(" AND status = ?{}", values.len() + 1));
            values.push(Box::new(status.as_str()));
        }
        if let Some(from) = query.from {
            sql.push_str(&format!(" AND started_at >= ?{}", values.len() + 1));
            values.push(Box::new(from));
        }
        if let Some(to) = query.to {
            sql.push_str(&format!(" AND started_at <= ?{}", values.len() + 1));
            values.push(Box::new(to));
        }
        let limit = query.limit.filter(|limit| *limit > 0).unwrap_or(DEFAULT_SEARCH_LIMIT);
        let offset = query.offset.unwrap_or(0);
        sql.push_str(&format!(
            " ORDER BY started_at DESC, id DESC LIMIT ?{} OFFSET ?{}",
            values.len() + 1,
            values.len() + 2
        ));
        values.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        values.push(Box::new(i64::try_from(offset).unwrap_or(i64::MAX)));

        let guard = self.lock();
        let mut stmt = guard.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter().map(|value| &**value)), run_row)?;
        let mut runs = Vec::new();
        for row in rows {
            runs.push(run_from_row(row?)?);
        }
        Ok(runs)
    }

    /// Deletes a run and, by cascade, its snapshots.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the run does not exist.
    pub fn delete_run(&self, id: RunId) -> Result<(), StoreError> {
        let guard = self.lock();
        let affected = guard.execute("DELETE FROM runs WHERE id = ?1", params![id.get()])?;
        drop(guard);
        if affected == 0 {
            return Err(StoreError::NotFound(format!("run {id}")));
        }
        Ok(())
    }

    /// Aggregates run totals, optionally filtered by project or endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when a query fails.
    pub fn run_statistics(
        &self,
        project_id: Option<ProjectId>,
        endpoint_id: Option<EndpointId>,
    ) -> Result<RunStatistics, StoreError> {
        let (filter, values) = run_filter_clause(project_id, endpoint_id);
        let mut statistics = RunStatistics::default();
        let guard = self.lock();
        {
            let sql = format!(
                "SELECT status, COUNT(*), COALESCE(SUM(total_requests), 0)
                 FROM runs WHERE 1 = 1{filter} GROUP BY status"
            );
            let mut stmt = guard.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter().map(|value| &**value)), |row| {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                let requests: i64 = row.get(2)?;
                Ok((status, count, requests))
            })?;
            for row in rows {
                let (status, count, requests) = row?;
                let count = count.max(0).unsigned_abs();
                statistics.total_requests += requests.max(0).unsigned_abs();
                match RunStatus::parse(&status) {
                    Some(RunStatus::Running) => statistics.running += count,
                    Some(RunStatus::Completed) => statistics.completed += count,
                    Some(RunStatus::Failed) => statistics.failed += count,
                    Some(RunStatus::Cancelled) => statistics.cancelled += count,
                    None => {
                        return Err(StoreError::Invalid(format!("unknown run status: {status}")));
                    }
                }
            }
        }
        {
            let sql = format!(
                "SELECT COALESCE(AVG(average_response_time), 0),
                        COALESCE(AVG(requests_per_second), 0)
                 FROM runs WHERE status = 'completed'{filter}"
            );
            let mut stmt = guard.prepare(&sql)?;
            let (average_response_time, average_rps) = stmt
                .query_row(params_from_iter(values.iter().map(|value| &**value)), |row| {
                    Ok((row.get::<_, f64>(0)?, row.get::<_, f64>(1)?))
                })?;
            statistics.average_response_time = average_response_time;
            statistics.average_rps = average_rps;
        }
        Ok(statistics)
    }
}

/// Builds the shared run filter clause and its bound values.
fn run_filter_clause(
    project_id: Option<ProjectId>,
    endpoint_id: Option<EndpointId>,
) -> (String, Vec<Box<dyn rusqlite::types::ToSql>>) {
    let mut filter = String::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    if let Some(endpoint_id) = endpoint_id {
        filter.push_str(" AND endpoint_id = ?1");
        values.push(Box::new(endpoint_id.get()));
    } else if let Some(project_id) = project_id {
        filter.push_str(" AND endpoint_id IN (SELECT id FROM endpoints WHERE project_id = ?1)");
        values.push(Box::new(project_id.get()));
    }
    (filter, values)
}

// ============================================================================
// SECTION: Snapshots
// ============================================================================

impl CatalogStore {
    /// Appends a sampled snapshot to a run's timeline.
    ///
    /// A no-op when the run row is not yet visible; the engine may emit
    /// before the run insert is observable and the run must not fail over
    /// telemetry.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the insert fails.
    pub fn append_snapshot(
        &self,
        token: &RunToken,
        sample: &MetricSample,
    ) -> Result<(), StoreError> {
        let guard = self.lock();
        let run_id: Option<i64> = guard
            .query_row("SELECT id FROM runs WHERE token = ?1", params![token.as_str()], |row| {
                row.get(0)
            })
            .optional()?;
        let Some(run_id) = run_id else {
            return Ok(());
        };
        guard.execute(
            "INSERT INTO run_snapshots (run_id, timestamp, response_time_ms, status_code,
                                        total_requests, successful_requests, failed_requests,
                                        current_rps, average_response_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                run_id,
                sample.timestamp,
                opt_run_count(sample.response_time_ms)?,
                sample.status_code,
                opt_run_count(sample.total_requests)?,
                opt_run_count(sample.successful_requests)?,
                opt_run_count(sample.failed_requests)?,
                sample.current_rps,
                sample.average_response_time,
            ],
        )?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw project row before typed conversion.
struct ProjectRow {
    id: i64,
    name: String,
    description: Option<String>,
    auth_json: Option<String>,
    created_at: i64,
    updated_at: i64,
}

/// Maps a project row into its raw form.
fn project_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectRow> {
    Ok(ProjectRow {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        auth_json: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Converts a raw project row into the typed model.
fn project_from_row(row: ProjectRow) -> Result<Project, StoreError> {
    Ok(Project {
        id: project_id(row.id)?,
        name: row.name,
        description: row.description,
        auth: decode_auth(row.auth_json.as_deref())?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

/// Raw endpoint row before typed conversion.
struct EndpointRow {
    id: i64,
    project_id: i64,
    name: String,
    description: Option<String>,
    url: String,
    method: String,
    users: i64,
    requests: Option<i64>,
    duration_secs: Option<i64>,
    content_type: String,
    body: Option<String>,
    insecure_tls: bool,
    requires_auth: bool,
    headers_json: Option<String>,
    auth_json: Option<String>,
}

/// Maps an endpoint row into its raw form.
fn endpoint_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EndpointRow> {
    Ok(EndpointRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        url: row.get(4)?,
        method: row.get(5)?,
        users: row.get(6)?,
        requests: row.get(7)?,
        duration_secs: row.get(8)?,
        content_type: row.get(9)?,
        body: row.get(10)?,
        insecure_tls: row.get(11)?,
        requires_auth: row.get(12)?,
        headers_json: row.get(13)?,
        auth_json: row.get(14)?,
    })
}

/// Converts a raw endpoint row into the typed model.
fn endpoint_from_row(row: EndpointRow) -> Result<Endpoint, StoreError> {
    Ok(Endpoint {
        id: endpoint_id(row.id)?,
        project_id: project_id(row.project_id)?,
        name: row.name,
        description: row.description,
        url: row.url,
        method: parse_method(&row.method)?,
        users: u32::try_from(row.users)
            .map_err(|_| StoreError::Invalid(format!("invalid user count: {}", row.users)))?,
        requests: opt_u64(row.requests)?,
        duration_secs: opt_u64(row.duration_secs)?,
        content_type: row.content_type,
        body: row.body,
        insecure_tls: row.insecure_tls,
        requires_auth: row.requires_auth,
        headers: decode_headers(row.headers_json.as_deref())?,
        auth: decode_auth(row.auth_json.as_deref())?,
    })
}

/// Raw run row before typed conversion.
struct RunRow {
    id: i64,
    token: String,
    endpoint_id: Option<i64>,
    url: String,
    method: String,
    users: i64,
    target_requests: Option<i64>,
    target_duration_secs: Option<i64>,
    started_at: i64,
    completed_at: Option<i64>,
    status: String,
    error_message: Option<String>,
    total_requests: Option<i64>,
    successful_requests: Option<i64>,
    failed_requests: Option<i64>,
    requests_per_second: Option<f64>,
    average_response_time: Option<f64>,
    min_response_time: Option<f64>,
    max_response_time: Option<f64>,
    percentile50: Option<f64>,
    percentile75: Option<f64>,
    percentile90: Option<f64>,
    percentile95: Option<f64>,
    percentile99: Option<f64>,
    total_elapsed_time: Option<i64>,
    status_codes_json: Option<String>,
}

/// Maps a run row into its raw form.
fn run_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        id: row.get(0)?,
        token: row.get(1)?,
        endpoint_id: row.get(2)?,
        url: row.get(3)?,
        method: row.get(4)?,
        users: row.get(5)?,
        target_requests: row.get(6)?,
        target_duration_secs: row.get(7)?,
        started_at: row.get(8)?,
        completed_at: row.get(9)?,
        status: row.get(10)?,
        error_message: row.get(11)?,
        total_requests: row.get(12)?,
        successful_requests: row.get(13)?,
        failed_requests: row.get(14)?,
        requests_per_second: row.get(15)?,
        average_response_time: row.get(16)?,
        min_response_time: row.get(17)?,
        max_response_time: row.get(18)?,
        percentile50: row.get(19)?,
        percentile75: row.get(20)?,
        percentile90: row.get(21)?,
        percentile95: row.get(22)?,
        percentile99: row.get(23)?,
        total_elapsed_time: row.get(24)?,
        status_codes_json: row.get(25)?,
    })
}

/// Converts a raw run row into the typed model.
fn run_from_row(row: RunRow) -> Result<Run, StoreError> {
    let token = RunToken::new(row.token);
    let status = RunStatus::parse(&row.status)
        .ok_or_else(|| StoreError::Invalid(format!("unknown run status: {}", row.status)))?;
    let aggregate = match row.total_requests {
        Some(total_requests) => {
            let status_codes: BTreeMap<u16, StatusAggregate> = match row.status_codes_json {
                Some(json) => serde_json::from_str(&json)
                    .map_err(|err| StoreError::Invalid(err.to_string()))?,
                None => BTreeMap::new(),
            };
            Some(RunAggregate {
                run_token: token.clone(),
                total_requests: total_requests.max(0).unsigned_abs(),
                successful_requests: row.successful_requests.unwrap_or(0).max(0).unsigned_abs(),
                failed_requests: row.failed_requests.unwrap_or(0).max(0).unsigned_abs(),
                requests_per_second: row.requests_per_second.unwrap_or(0.0),
                average_response_time: row.average_response_time.unwrap_or(0.0),
                min_response_time: row.min_response_time.unwrap_or(0.0),
                max_response_time: row.max_response_time.unwrap_or(0.0),
                percentile50: row.percentile50.unwrap_or(0.0),
                percentile75: row.percentile75.unwrap_or(0.0),
                percentile90: row.percentile90.unwrap_or(0.0),
                percentile95: row.percentile95.unwrap_or(0.0),
                percentile99: row.percentile99.unwrap_or(0.0),
                total_elapsed_time: row.total_elapsed_time.unwrap_or(0).max(0).unsigned_abs(),
                status_codes,
            })
        }
        None => None,
    };
    Ok(Run {
        id: run_id(row.id)?,
        token,
        endpoint_id: row.endpoint_id.map(endpoint_id).transpose()?,
        url: row.url,
        method: parse_method(&row.method)?,
        users: u32::try_from(row.users)
            .map_err(|_| StoreError::Invalid(format!("invalid user count: {}", row.users)))?,
        target_requests: opt_u64(row.target_requests)?,
        target_duration_secs: opt_u64(row.target_duration_secs)?,
        started_at: row.started_at,
        completed_at: row.completed_at,
        status,
        error_message: row.error_message,
        aggregate,
    })
}

// ============================================================================
// SECTION: Encoding Helpers
// ============================================================================

/// Encodes an optional auth spec as a JSON column value.
fn encode_auth(auth: Option<&AuthSpec>) -> Result<Option<String>, StoreError> {
    auth.map(|auth| {
        serde_json::to_string(auth).map_err(|err| StoreError::Invalid(err.to_string()))
    })
    .transpose()
}

/// Decodes an optional auth spec JSON column value.
fn decode_auth(json: Option<&str>) -> Result<Option<AuthSpec>, StoreError> {
    json.map(|json| {
        serde_json::from_str(json).map_err(|err| StoreError::Invalid(err.to_string()))
    })
    .transpose()
}

/// Encodes an optional header map as a JSON column value.
fn encode_headers(
    headers: Option<&BTreeMap<String, String>>,
) -> Result<Option<String>, StoreError> {
    headers
        .map(|headers| {
            serde_json::to_string(headers).map_err(|err| StoreError::Invalid(err.to_string()))
        })
        .transpose()
}

/// Decodes an optional header map JSON column value.
fn decode_headers(json: Option<&str>) -> Result<Option<BTreeMap<String, String>>, StoreError> {
    json.map(|json| {
        serde_json::from_str(json).map_err(|err| StoreError::Invalid(err.to_string()))
    })
    .transpose()
}

/// Parses a stored method label.
fn parse_method(label: &str) -> Result<HttpMethod, StoreError> {
    HttpMethod::parse(label).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Converts a stored project rowid into its typed identifier.
fn project_id(raw: i64) -> Result<ProjectId, StoreError> {
    ProjectId::from_raw(raw).ok_or_else(|| StoreError::Invalid(format!("invalid project id: {raw}")))
}

/// Converts a stored endpoint rowid into its typed identifier.
fn endpoint_id(raw: i64) -> Result<EndpointId, StoreError> {
    EndpointId::from_raw(raw)
        .ok_or_else(|| StoreError::Invalid(format!("invalid endpoint id: {raw}")))
}

/// Converts a stored run rowid into its typed identifier.
fn run_id(raw: i64) -> Result<RunId, StoreError> {
    RunId::from_raw(raw).ok_or_else(|| StoreError::Invalid(format!("invalid run id: {raw}")))
}

/// Converts an optional unsigned count into a nullable column value.
fn opt_i64(value: Option<u64>) -> Result<Option<i64>, StoreError> {
    value
        .map(|value| {
            i64::try_from(value)
                .map_err(|_| StoreError::Invalid(format!("count exceeds storage range: {value}")))
        })
        .transpose()
}

/// Converts an unsigned count into a column value.
fn opt_run_count(value: u64) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Invalid(format!("count exceeds storage range: {value}")))
}

/// Converts a nullable column value back into an optional unsigned count.
fn opt_u64(value: Option<i64>) -> Result<Option<u64>, StoreError> {
    value
        .map(|value| {
            u64::try_from(value)
                .map_err(|_| StoreError::Invalid(format!("negative stored count: {value}")))
        })
        .transpose()
}

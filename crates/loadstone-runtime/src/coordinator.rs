// crates/loadstone-runtime/src/coordinator.rs
// ============================================================================
// Module: Run Coordinator
// Description: Single-active-run gate and run pipeline orchestration.
// Purpose: Enforce mutual exclusion and sequence auth, engine, store, stream.
// Dependencies: loadstone-auth, loadstone-core, loadstone-engine,
//               loadstone-store-sqlite, thiserror, tracing
// ============================================================================

//! ## Overview
//! At most one run executes per process. `start` refuses with
//! [`StartError::RunInProgress`] while the slot is held, opens the run row
//! with status `Running`, and hands off to a pipeline thread. The pipeline
//! publishes terminal stream events only after the engine has joined its
//! workers, so no subscriber observes a terminal event before the last
//! metric of that run was enqueued.
//! Invariants:
//! - Terminal status is persisted before the terminal stream event.
//! - `stop` is a no-op outside `Running` and always succeeds.
//! - A cancelled run never emits `TestCompleted`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::thread;

use loadstone_auth::AuthError;
use loadstone_auth::BearerToken;
use loadstone_auth::fetch_token;
use loadstone_core::AuthSpec;
use loadstone_core::Endpoint;
use loadstone_core::EndpointId;
use loadstone_core::MetricHub;
use loadstone_core::MetricSample;
use loadstone_core::RunRequest;
use loadstone_core::RunToken;
use loadstone_core::StreamEvent;
use loadstone_core::Subscription;
use loadstone_core::ValidationError;
use loadstone_core::validate_run_request;
use loadstone_engine::BearerHeader;
use loadstone_engine::CancelToken;
use loadstone_engine::EnginePlan;
use loadstone_engine::SampleObserver;
use loadstone_engine::StopCriterion;
use loadstone_engine::engine::DEFAULT_REQUEST_TIMEOUT_MS;
use loadstone_store_sqlite::CatalogStore;
use loadstone_store_sqlite::StoreError;
use thiserror::Error;
use tracing::error;
use tracing::info;
use tracing::warn;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors refusing a run start.
///
/// # Invariants
/// - A refused start leaves coordinator and store state unchanged, except
///   that validation happens before the run row is opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    /// Another run currently holds the active slot.
    #[error("a run is already in progress")]
    RunInProgress,
    /// Referenced endpoint or project does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// The run request failed admission checks.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The store refused the run row.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// The active run tracked by the coordinator.
struct ActiveRun {
    /// Token of the running run.
    token: RunToken,
    /// Cancellation token shared with the engine workers.
    cancel: CancelToken,
}

/// Run lifecycle manager and external facade.
///
/// # Invariants
/// - The slot mutex is held across the availability check and the run-row
///   insert, so two concurrent starts cannot both succeed.
pub struct RunCoordinator {
    /// Persistent catalog.
    store: CatalogStore,
    /// Live metric broadcast.
    hub: Arc<MetricHub>,
    /// Single active-run slot.
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl RunCoordinator {
    /// Creates a coordinator over the given store and hub.
    #[must_use]
    pub fn new(store: CatalogStore, hub: Arc<MetricHub>) -> Self {
        Self {
            store,
            hub,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the catalog store backing this coordinator.
    #[must_use]
    pub const fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Returns the metric hub backing this coordinator.
    #[must_use]
    pub const fn hub(&self) -> &Arc<MetricHub> {
        &self.hub
    }

    /// Attaches a new metric stream subscriber.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }

    /// Starts a run for a stored endpoint.
    ///
    /// The endpoint's configuration is captured into the run; the effective
    /// auth spec is the endpoint's override or, failing that, the owning
    /// project's spec (only when the endpoint requires auth).
    ///
    /// Returns as soon as the run is admitted. The token-fetch preflight
    /// runs on the pipeline thread, so an auth failure is never returned
    /// here: it transitions the run to `Failed` and dispatches
    /// `AuthenticationFailed` followed by `TestError`. Use
    /// [`Self::test_auth`] for a synchronous preflight check.
    ///
    /// # Errors
    ///
    /// Returns [`StartError`] when the endpoint is unknown, the request is
    /// invalid, or a run is already in progress.
    pub fn start_endpoint_run(
        &self,
        endpoint_id: EndpointId,
        users_override: Option<u32>,
    ) -> Result<RunToken, StartError> {
        let endpoint = self
            .store
            .get_endpoint(endpoint_id)?
            .ok_or_else(|| StartError::NotFound(format!("endpoint {endpoint_id}")))?;
        let users = users_override.unwrap_or(endpoint.users);
        let request = endpoint_request(&endpoint, users);
        validate_run_request(&request)?;
        let auth = self.effective_auth(&endpoint)?;

        let mut slot = self.lock_slot();
        if slot.is_some() {
            return Err(StartError::RunInProgress);
        }
        let run = self.store.create_run_for_endpoint(&endpoint, Some(users))?;
        let token = run.token.clone();
        *slot = Some(self.spawn_pipeline(&token, &request, auth)?);
        drop(slot);
        info!(run_token = %token, endpoint = %endpoint_id, "run started");
        Ok(token)
    }

    /// Starts an ad-hoc run from an inline request.
    ///
    /// Returns as soon as the run is admitted; as with
    /// [`Self::start_endpoint_run`], a failed auth preflight surfaces
    /// asynchronously through the run's `Failed` status and the
    /// `AuthenticationFailed` and `TestError` events.
    ///
    /// # Errors
    ///
    /// Returns [`StartError`] when the request is invalid or a run is
    /// already in progress.
    pub fn start_ad_hoc_run(&self, request: &RunRequest) -> Result<RunToken, StartError> {
        validate_run_request(request)?;
        let mut slot = self.lock_slot();
        if slot.is_some() {
            return Err(StartError::RunInProgress);
        }
        let run = self.store.create_ad_hoc_run(request)?;
        let token = run.token.clone();
        *slot = Some(self.spawn_pipeline(&token, request, request.auth.clone())?);
        drop(slot);
        info!(run_token = %token, url = %request.url, "ad-hoc run started");
        Ok(token)
    }

    /// Cancels the active run. A no-op outside `Running`.
    pub fn stop(&self) {
        let slot = self.lock_slot();
        if let Some(active) = slot.as_ref() {
            info!(run_token = %active.token, "stop requested");
            active.cancel.cancel();
        }
    }

    /// Returns true while a run holds the active slot.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.lock_slot().is_some()
    }

    /// Performs a one-off token fetch without starting a run.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] exactly as the preflight would.
    pub fn test_auth(
        &self,
        spec: &AuthSpec,
        insecure_tls: bool,
    ) -> Result<BearerToken, AuthError> {
        fetch_token(spec, insecure_tls)
    }

    /// Resolves the effective auth spec for an endpoint run.
    fn effective_auth(&self, endpoint: &Endpoint) -> Result<Option<AuthSpec>, StoreError> {
        if !endpoint.requires_auth {
            return Ok(None);
        }
        if endpoint.auth.is_some() {
            return Ok(endpoint.auth.clone());
        }
        Ok(self.store.get_project(endpoint.project_id)?.and_then(|project| project.auth))
    }

    /// Locks the active-run slot.
    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<ActiveRun>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the pipeline thread for an admitted run and returns its slot
    /// record.
    fn spawn_pipeline(
        &self,
        token: &RunToken,
        request: &RunRequest,
        auth: Option<AuthSpec>,
    ) -> Result<ActiveRun, StartError> {
        let cancel = CancelToken::new();
        let pipeline = Pipeline {
            store: self.store.clone(),
            hub: Arc::clone(&self.hub),
            active: Arc::clone(&self.active),
            token: token.clone(),
            request: request.clone(),
            auth,
            cancel: cancel.clone(),
        };
        // The run row exists and the slot is held; the thread owns the rest
        // of the lifecycle including slot release.
        thread::Builder::new()
            .name(format!("loadstone-run-{token}"))
            .spawn(move || pipeline.run())
            .map_err(|err| StartError::Store(StoreError::Io(err.to_string())))?;
        Ok(ActiveRun {
            token: token.clone(),
            cancel,
        })
    }
}

// ============================================================================
// SECTION: Pipeline
// ============================================================================

/// One run's worth of pipeline state, moved onto its thread.
struct Pipeline {
    /// Persistent catalog.
    store: CatalogStore,
    /// Live metric broadcast.
    hub: Arc<MetricHub>,
    /// Active-run slot for release at the end.
    active: Arc<Mutex<Option<ActiveRun>>>,
    /// Token of this run.
    token: RunToken,
    /// Effective target description.
    request: RunRequest,
    /// Effective auth spec, when the run requires a preflight.
    auth: Option<AuthSpec>,
    /// Cancellation token shared with `stop`.
    cancel: CancelToken,
}

impl Pipeline {
    /// Executes preflight, engine, terminal persistence, and terminal events.
    fn run(self) {
        let bearer = match self.preflight() {
            Ok(bearer) => bearer,
            Err(()) => {
                self.release_slot();
                return;
            }
        };

        let plan = EnginePlan {
            run_token: self.token.clone(),
            url: self.request.url.clone(),
            method: self.request.method,
            users: self.request.users,
            stop: StopCriterion::from_settings(
                self.request.requests,
                self.request.duration_secs,
            ),
            headers: self.request.headers.clone(),
            body: self.request.body.clone(),
            content_type: self.request.content_type.clone(),
            insecure_tls: self.request.insecure_tls,
            bearer,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        };
        let observer: Arc<dyn SampleObserver> = Arc::new(FanoutObserver {
            hub: Arc::clone(&self.hub),
            store: self.store.clone(),
        });

        match loadstone_engine::execute(&plan, &self.cancel, observer) {
            Ok(outcome) if outcome.cancelled => {
                // Workers have exited; record the partial aggregate. No
                // TestCompleted: cancellation is visible via the run status.
                if let Err(err) = self.store.cancel_run(&self.token, &outcome.aggregate) {
                    error!(run_token = %self.token, error = %err, "cancel write failed");
                }
                info!(run_token = %self.token, "run cancelled");
            }
            Ok(outcome) => {
                // Persist first; the in-memory terminal event dispatches even
                // when the completion write fails.
                if let Err(err) = self.store.complete_run(&self.token, &outcome.aggregate) {
                    error!(run_token = %self.token, error = %err, "completion write failed");
                }
                self.hub.publish_reliable(&StreamEvent::TestCompleted {
                    aggregate: outcome.aggregate,
                });
                info!(run_token = %self.token, "run completed");
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(store_err) = self.store.fail_run(&self.token, &message) {
                    error!(run_token = %self.token, error = %store_err, "failure write failed");
                }
                self.hub.publish_reliable(&StreamEvent::TestError {
                    run_token: self.token.clone(),
                    error: message,
                });
                error!(run_token = %self.token, error = %err, "engine failed");
            }
        }
        self.release_slot();
    }

    /// Runs the optional token-fetch preflight.
    ///
    /// On failure the run is transitioned to `Failed` and both
    /// `AuthenticationFailed` and `TestError` are dispatched; `Err(())`
    /// tells the caller the pipeline is over.
    fn preflight(&self) -> Result<Option<BearerHeader>, ()> {
        let Some(spec) = &self.auth else {
            return Ok(None);
        };
        self.hub.publish_reliable(&StreamEvent::AuthenticationStarted {
            run_token: self.token.clone(),
        });
        match fetch_token(spec, self.request.insecure_tls) {
            Ok(token) => {
                self.hub.publish_reliable(&StreamEvent::AuthenticationSuccess {
                    run_token: self.token.clone(),
                });
                Ok(Some(BearerHeader {
                    name: token.header_name,
                    value: token.value,
                }))
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(store_err) = self.store.fail_run(&self.token, &message) {
                    error!(run_token = %self.token, error = %store_err, "failure write failed");
                }
                self.hub.publish_reliable(&StreamEvent::AuthenticationFailed {
                    run_token: self.token.clone(),
                    error: message.clone(),
                });
                self.hub.publish_reliable(&StreamEvent::TestError {
                    run_token: self.token.clone(),
                    error: message,
                });
                warn!(run_token = %self.token, error = %err, "auth preflight failed");
                Err(())
            }
        }
    }

    /// Returns the coordinator to `Idle`.
    fn release_slot(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

// ============================================================================
// SECTION: Fan-Out Observer
// ============================================================================

/// Streams every snapshot and persists every tenth.
struct FanoutObserver {
    /// Live metric broadcast.
    hub: Arc<MetricHub>,
    /// Persistent catalog for the sampled timeline.
    store: CatalogStore,
}

impl SampleObserver for FanoutObserver {
    fn on_metric(&self, sample: &MetricSample) {
        self.hub.publish_metric(&StreamEvent::MetricReceived {
            sample: sample.clone(),
        });
    }

    fn persist(&self, sample: &MetricSample) {
        // Telemetry is best-effort; a failed snapshot write never fails the run.
        if let Err(err) = self.store.append_snapshot(&sample.run_token, sample) {
            warn!(run_token = %sample.run_token, error = %err, "snapshot write failed");
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds the effective run request captured from an endpoint.
fn endpoint_request(endpoint: &Endpoint, users: u32) -> RunRequest {
    RunRequest {
        url: endpoint.url.clone(),
        method: endpoint.method,
        users,
        requests: endpoint.requests,
        duration_secs: endpoint.duration_secs,
        body: endpoint.body.clone(),
        content_type: endpoint.content_type.clone(),
        headers: endpoint.headers.clone(),
        insecure_tls: endpoint.insecure_tls,
        auth: None,
    }
}

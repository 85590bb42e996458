// crates/loadstone-server/src/lib.rs
// ============================================================================
// Module: Loadstone HTTP Server Library
// Description: Axum adapter over the run coordinator and catalog.
// Purpose: Expose the full operation set over HTTP with a live event stream.
// Dependencies: axum, loadstone-core, loadstone-runtime, serde, tokio,
//               tokio-stream, tower-http, tracing
// ============================================================================

//! ## Overview
//! The server binds the facade operations to REST routes and bridges the
//! metric stream to Server-Sent Events. URL shapes are adapter detail; the
//! wire contracts live in `loadstone-core` (samples, aggregates, and the
//! pinned stream event names).

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod handlers;
pub mod stream;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::Request;
use axum::routing::get;
use axum::routing::post;
use axum::routing::put;
use loadstone_runtime::RunCoordinator;
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing::info_span;

use crate::handlers::AppState;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// HTTP server configuration.
///
/// # Invariants
/// - Defaults bind the loopback interface only.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_bind")]
    pub bind: IpAddr,
    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Returns the default bind interface.
const fn default_bind() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// Returns the default port.
const fn default_port() -> u16 {
    DEFAULT_PORT
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server bootstrap errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Listener could not bind the configured address.
    #[error("bind failed on {addr}: {reason}")]
    Bind {
        /// Address that failed to bind.
        addr: SocketAddr,
        /// Underlying failure description.
        reason: String,
    },
    /// Serving failed after startup.
    #[error("server failed: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Builds the router binding the operation set.
#[must_use]
pub fn build_router(coordinator: Arc<RunCoordinator>) -> Router {
    let state = AppState {
        coordinator,
    };
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/runs", get(handlers::search_runs).post(handlers::start_ad_hoc_run))
        .route("/api/runs/stop", post(handlers::stop_run))
        .route("/api/runs/active", get(handlers::active_run))
        .route("/api/runs/recent", get(handlers::recent_runs))
        .route("/api/runs/:id", get(handlers::get_run).delete(handlers::delete_run))
        .route("/api/runs/:id/timeline", get(handlers::run_timeline))
        .route("/api/statistics", get(handlers::run_statistics))
        .route("/api/auth/test", post(handlers::test_auth))
        .route("/api/projects", get(handlers::list_projects).post(handlers::create_project))
        .route(
            "/api/projects/:id",
            get(handlers::get_project)
                .put(handlers::update_project)
                .delete(handlers::delete_project),
        )
        .route(
            "/api/projects/:id/auth",
            put(handlers::set_project_auth).delete(handlers::clear_project_auth),
        )
        .route("/api/projects/:id/export", get(handlers::export_project))
        .route("/api/projects/import", post(handlers::import_project))
        .route(
            "/api/projects/:id/endpoints",
            get(handlers::list_endpoints).post(handlers::create_endpoint),
        )
        .route(
            "/api/endpoints/:id",
            get(handlers::get_endpoint)
                .put(handlers::update_endpoint)
                .delete(handlers::delete_endpoint),
        )
        .route("/api/endpoints/:id/runs", post(handlers::start_endpoint_run))
        .route("/api/stream", get(stream::stream_events))
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri(),
            )
        }))
}

/// Binds the listener and serves until shutdown.
///
/// # Errors
///
/// Returns [`ServerError`] when the bind or serve step fails.
pub async fn run_server(
    config: &ServerConfig,
    coordinator: Arc<RunCoordinator>,
) -> Result<(), ServerError> {
    let addr = SocketAddr::new(config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| ServerError::Bind {
        addr,
        reason: err.to_string(),
    })?;
    info!(%addr, "loadstone server listening");
    axum::serve(listener, build_router(coordinator))
        .await
        .map_err(|err| ServerError::Serve(err.to_string()))
}

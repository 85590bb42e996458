// crates/loadstone-runtime/tests/common/mod.rs
// ============================================================================
// Module: Runtime Test Helpers
// Description: Fake load targets and auth endpoints for lifecycle tests.
// Purpose: Drive the full run pipeline against local servers.
// Dependencies: tiny_http, loadstone-core, loadstone-runtime
// ============================================================================

//! ## Overview
//! Local `tiny_http` servers standing in for the load target and the token
//! endpoint, plus polling helpers for terminal run states.

#![allow(dead_code, reason = "Each integration test binary uses a subset of the helpers.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use loadstone_core::RunStatus;
use loadstone_core::RunToken;
use loadstone_runtime::CatalogStore;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// Handle to a running fake target.
pub struct TargetHandle {
    /// Base URL of the target.
    pub url: String,
    /// Total requests served.
    hits: Arc<AtomicU64>,
    /// Last Authorization header value observed.
    last_authorization: Arc<Mutex<Option<String>>>,
    /// Keeps the server alive for the lifetime of the handle.
    server: Arc<Server>,
}

impl TargetHandle {
    /// Returns the number of requests served so far.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::SeqCst)
    }

    /// Returns the last Authorization header value observed.
    pub fn last_authorization(&self) -> Option<String> {
        self.last_authorization.lock().unwrap().clone()
    }
}

impl Drop for TargetHandle {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

/// Spawns a fake load target answering `status` after `delay`.
pub fn spawn_target(status: u16, delay: Option<Duration>) -> TargetHandle {
    let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://127.0.0.1:{}/load", addr.port());
    let hits = Arc::new(AtomicU64::new(0));
    let last_authorization = Arc::new(Mutex::new(None));

    let worker_server = Arc::clone(&server);
    let worker_hits = Arc::clone(&hits);
    let worker_auth = Arc::clone(&last_authorization);
    thread::spawn(move || {
        while let Ok(request) = worker_server.recv() {
            if let Some(delay) = delay {
                thread::sleep(delay);
            }
            let authorization = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Authorization"))
                .map(|header| header.value.as_str().to_string());
            if authorization.is_some() {
                *worker_auth.lock().unwrap() = authorization;
            }
            worker_hits.fetch_add(1, Ordering::SeqCst);
            let _ = request.respond(Response::empty(status));
        }
    });

    TargetHandle {
        url,
        hits,
        last_authorization,
        server,
    }
}

/// Spawns a fake token endpoint answering `status` with `body` forever.
pub fn spawn_auth(status: u16, body: &str) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://127.0.0.1:{}/token", addr.port());
    let body = body.to_string();
    thread::spawn(move || {
        while let Ok(request) = server.recv() {
            let header: Header = "Content-Type: application/json".parse().unwrap();
            let response =
                Response::from_string(body.clone()).with_status_code(status).with_header(header);
            let _ = request.respond(response);
        }
    });
    url
}

/// Polls the store until the run reaches `expected` or the timeout passes.
pub fn wait_for_status(
    store: &CatalogStore,
    token: &RunToken,
    expected: RunStatus,
    timeout: Duration,
) {
    let deadline = Instant::now() + timeout;
    loop {
        let run = store.get_run_by_token(token).unwrap().unwrap();
        if run.status == expected {
            return;
        }
        assert!(
            Instant::now() < deadline,
            "run {token} stuck in {:?}, expected {expected:?}",
            run.status
        );
        thread::sleep(Duration::from_millis(20));
    }
}

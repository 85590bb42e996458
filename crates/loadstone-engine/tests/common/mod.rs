// crates/loadstone-engine/tests/common/mod.rs
// ============================================================================
// Module: Engine Test Helpers
// Description: Local fake HTTP target for engine tests.
// Purpose: Serve deterministic responses and record request metadata.
// Dependencies: tiny_http
// ============================================================================

//! ## Overview
//! [`spawn_target`] runs a `tiny_http` server on an ephemeral port in a
//! background thread. It answers every request with a fixed status after an
//! optional delay and records the hit count plus the last `Authorization`
//! header seen.

#![allow(dead_code, reason = "Each integration test binary uses a subset of the helpers.")]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

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

/// Spawns a fake target answering `status` after `delay`.
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

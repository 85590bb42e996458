// crates/loadstone-auth/tests/token_fetch.rs
// ============================================================================
// Module: Token Fetcher Tests
// Description: End-to-end token acquisition against a local fake endpoint.
// Purpose: Validate success, rejection, bad-body, and missing-path handling.
// Dependencies: loadstone-auth, loadstone-core, tiny_http
// ============================================================================

//! ## Overview
//! Drives [`loadstone_auth::fetch_token`] against a `tiny_http` server to
//! exercise the full request/parse/extract pipeline.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions are permitted."
)]

use std::thread;

use loadstone_auth::AuthError;
use loadstone_auth::fetch_token;
use loadstone_core::AuthSpec;
use loadstone_core::HttpMethod;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Serves `responses` one by one on an ephemeral port, then exits.
fn serve(responses: Vec<(u16, String)>) -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://127.0.0.1:{}/token", addr.port());
    thread::spawn(move || {
        for (status, body) in responses {
            let Ok(request) = server.recv() else {
                return;
            };
            let header: Header = "Content-Type: application/json".parse().unwrap();
            let response =
                Response::from_string(body).with_status_code(status).with_header(header);
            let _ = request.respond(response);
        }
    });
    url
}

fn spec(url: String, token_path: &str) -> AuthSpec {
    AuthSpec {
        url,
        method: HttpMethod::Post,
        content_type: "application/json".to_string(),
        body: Some(r#"{"user":"load","pass":"test"}"#.to_string()),
        headers: None,
        token_path: token_path.to_string(),
        header_name: "Authorization".to_string(),
        header_prefix: "Bearer ".to_string(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn fetches_and_prefixes_token() {
    let url = serve(vec![(200, r#"{"data":{"token":"abc"}}"#.to_string())]);
    let token = fetch_token(&spec(url, "data.token"), false).unwrap();
    assert_eq!(token.header_name, "Authorization");
    assert_eq!(token.value, "Bearer abc");
}

#[test]
fn non_2xx_is_rejected_with_status() {
    let url = serve(vec![(401, r#"{"error":"nope"}"#.to_string())]);
    let err = fetch_token(&spec(url, "data.token"), false).unwrap_err();
    assert_eq!(err, AuthError::Rejected {
        status: 401,
    });
}

#[test]
fn non_json_body_is_bad_response() {
    let url = serve(vec![(200, "<html>not json</html>".to_string())]);
    assert!(matches!(
        fetch_token(&spec(url, "data.token"), false),
        Err(AuthError::BadResponse(_))
    ));
}

#[test]
fn unresolvable_path_is_token_missing() {
    let url = serve(vec![(200, r#"{"data":{"token":"abc"}}"#.to_string())]);
    let err = fetch_token(&spec(url, "data.accessToken"), false).unwrap_err();
    assert_eq!(err, AuthError::TokenMissing {
        path: "data.accessToken".to_string(),
    });
}

#[test]
fn unreachable_endpoint_is_transport_failure() {
    // Nothing listens on this port.
    let spec = spec("http://127.0.0.1:1/token".to_string(), "token");
    assert!(matches!(fetch_token(&spec, false), Err(AuthError::Transport(_))));
}

#[test]
fn numeric_token_is_rendered_without_quotes() {
    let url = serve(vec![(200, r#"{"session":{"id":987654}}"#.to_string())]);
    let token = fetch_token(&spec(url, "session.id"), false).unwrap();
    assert_eq!(token.value, "Bearer 987654");
}

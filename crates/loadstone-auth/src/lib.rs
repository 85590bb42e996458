// crates/loadstone-auth/src/lib.rs
// ============================================================================
// Module: Loadstone Token Fetcher
// Description: Preflight bearer-token acquisition for load runs.
// Purpose: Turn an auth spec into a ready-to-inject header value.
// Dependencies: loadstone-core, reqwest, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The token fetcher performs one HTTP request described by an
//! [`AuthSpec`], parses the response body as JSON, walks the dotted token
//! path, and returns the header name plus prefixed token value the engine
//! injects into every target request. A failed fetch aborts the run before
//! any load is generated.
//! Invariants:
//! - TLS verification is skipped iff the insecure flag is set.
//! - Non-2xx responses fail closed; the body is never interpreted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use loadstone_core::AuthSpec;
use loadstone_core::HttpMethod;
use reqwest::blocking::Client;
use reqwest::blocking::RequestBuilder;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Timeout for the token request in milliseconds.
const TOKEN_REQUEST_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Token-fetch failures.
///
/// # Invariants
/// - Variants are stable for programmatic handling; messages never embed
///   response bodies or token material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Auth endpoint answered outside [200, 300).
    #[error("auth endpoint rejected the token request with status {status}")]
    Rejected {
        /// HTTP status code returned by the auth endpoint.
        status: u16,
    },
    /// Response body was not a JSON document.
    #[error("auth response is not valid json: {0}")]
    BadResponse(String),
    /// Token path did not resolve inside the response document.
    #[error("auth token not found at path: {path}")]
    TokenMissing {
        /// Dotted path that failed to resolve.
        path: String,
    },
    /// Transport-level failure reaching the auth endpoint.
    #[error("auth transport failure: {0}")]
    Transport(String),
    /// HTTP client could not be constructed.
    #[error("auth http client build failed: {0}")]
    Client(String),
}

// ============================================================================
// SECTION: Bearer Token
// ============================================================================

/// A fetched token ready for header injection.
///
/// # Invariants
/// - `value` already carries the configured header prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    /// Header name to inject.
    pub header_name: String,
    /// Prefixed header value.
    pub value: String,
}

// ============================================================================
// SECTION: Fetch
// ============================================================================

/// Fetches a bearer token as described by the auth spec.
///
/// # Errors
///
/// Returns [`AuthError`] on transport failure, a non-2xx response, a
/// non-JSON body, or an unresolvable token path.
pub fn fetch_token(spec: &AuthSpec, insecure_tls: bool) -> Result<BearerToken, AuthError> {
    let client = build_client(insecure_tls)?;
    let response = build_request(&client, spec)
        .send()
        .map_err(|err| AuthError::Transport(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(AuthError::Rejected {
            status: status.as_u16(),
        });
    }
    let body = response.text().map_err(|err| AuthError::Transport(err.to_string()))?;
    let document: Value =
        serde_json::from_str(&body).map_err(|err| AuthError::BadResponse(err.to_string()))?;
    let token = extract_token(&document, &spec.token_path)?;
    Ok(BearerToken {
        header_name: spec.header_name.clone(),
        value: format!("{}{token}", spec.header_prefix),
    })
}

/// Builds the blocking HTTP client for the token request.
fn build_client(insecure_tls: bool) -> Result<Client, AuthError> {
    Client::builder()
        .timeout(Duration::from_millis(TOKEN_REQUEST_TIMEOUT_MS))
        .danger_accept_invalid_certs(insecure_tls)
        .build()
        .map_err(|err| AuthError::Client(err.to_string()))
}

/// Assembles the token request from the auth spec.
fn build_request(client: &Client, spec: &AuthSpec) -> RequestBuilder {
    let method = to_reqwest_method(spec.method);
    let mut request = client
        .request(method, &spec.url)
        .header(reqwest::header::CONTENT_TYPE, spec.content_type.clone());
    if let Some(headers) = &spec.headers {
        for (name, value) in headers {
            request = request.header(name, value);
        }
    }
    if let Some(body) = &spec.body {
        request = request.body(body.clone());
    }
    request
}

/// Maps the method enum onto the client's method type.
fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
    }
}

/// Walks a dotted path of object keys and renders the value as token text.
///
/// String values are returned verbatim; any other JSON value is rendered as
/// its JSON text (no surrounding quotes can occur for non-strings).
fn extract_token(document: &Value, path: &str) -> Result<String, AuthError> {
    let mut current = document;
    for segment in path.split('.') {
        current = current.get(segment).ok_or_else(|| AuthError::TokenMissing {
            path: path.to_string(),
        })?;
    }
    match current {
        Value::String(token) => Ok(token.clone()),
        other => Ok(other.to_string()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn extracts_string_token_at_nested_path() {
        let document = json!({"data": {"token": "abc"}});
        assert_eq!(extract_token(&document, "data.token").unwrap(), "abc");
    }

    #[test]
    fn extracts_single_segment_path() {
        let document = json!({"token": "xyz"});
        assert_eq!(extract_token(&document, "token").unwrap(), "xyz");
    }

    #[test]
    fn renders_non_string_values_without_quotes() {
        let document = json!({"session": {"id": 1234}});
        assert_eq!(extract_token(&document, "session.id").unwrap(), "1234");
    }

    #[test]
    fn missing_segment_reports_full_path() {
        let document = json!({"data": {"token": "abc"}});
        let err = extract_token(&document, "data.access.token").unwrap_err();
        assert_eq!(err, AuthError::TokenMissing {
            path: "data.access.token".to_string(),
        });
    }

    #[test]
    fn walking_through_a_scalar_fails() {
        let document = json!({"data": "flat"});
        assert!(matches!(
            extract_token(&document, "data.token"),
            Err(AuthError::TokenMissing { .. })
        ));
    }
}

// crates/loadstone-core/src/model.rs
// ============================================================================
// Module: Loadstone Catalog Model
// Description: Projects, endpoints, auth specs, and ad-hoc run requests.
// Purpose: Describe load targets independently of any one run.
// Dependencies: serde, crate::{error, identifiers}
// ============================================================================

//! ## Overview
//! A [`Project`] groups [`Endpoint`] targets and may carry a shared
//! [`AuthSpec`]. An endpoint captures everything needed to drive one target:
//! URL, method, default workload shape, TLS policy, and an optional auth
//! override. A [`RunRequest`] is the ad-hoc equivalent of an endpoint,
//! supplied inline by an adapter.
//! Invariants:
//! - At most one of an endpoint's request budget and duration is set.
//! - Endpoint auth overrides the owning project's auth when both exist.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ValidationError;
use crate::identifiers::EndpointId;
use crate::identifiers::ProjectId;

// ============================================================================
// SECTION: HTTP Method
// ============================================================================

/// HTTP methods supported for load targets and auth requests.
///
/// # Invariants
/// - Closed set; parsing any other name is a [`ValidationError::UnknownMethod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// HTTP GET.
    #[default]
    Get,
    /// HTTP POST.
    Post,
    /// HTTP PUT.
    Put,
    /// HTTP DELETE.
    Delete,
    /// HTTP PATCH.
    Patch,
    /// HTTP HEAD.
    Head,
    /// HTTP OPTIONS.
    Options,
}

impl HttpMethod {
    /// Returns the canonical upper-case method name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Parses a method name (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::UnknownMethod`] for names outside the
    /// supported set.
    pub fn parse(name: &str) -> Result<Self, ValidationError> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(ValidationError::UnknownMethod(name.to_string())),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Auth Spec
// ============================================================================

/// Declarative description of how to acquire a bearer token before a run.
///
/// # Invariants
/// - `token_path` is a dot-separated sequence of JSON object keys.
/// - The injected header value is `header_prefix` + extracted token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSpec {
    /// Token endpoint URL.
    pub url: String,
    /// HTTP method for the token request.
    #[serde(default)]
    pub method: HttpMethod,
    /// Content type for the token request body.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Optional token request body.
    #[serde(default)]
    pub body: Option<String>,
    /// Optional extra headers for the token request.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Dotted path to the token inside the JSON response.
    pub token_path: String,
    /// Header name injected into target requests.
    #[serde(default = "default_auth_header_name")]
    pub header_name: String,
    /// Prefix prepended to the extracted token.
    #[serde(default = "default_auth_header_prefix")]
    pub header_prefix: String,
}

/// Returns the default content type for bodies.
fn default_content_type() -> String {
    "application/json".to_string()
}

/// Returns the default header name for token injection.
fn default_auth_header_name() -> String {
    "Authorization".to_string()
}

/// Returns the default prefix for token header values.
fn default_auth_header_prefix() -> String {
    "Bearer ".to_string()
}

// ============================================================================
// SECTION: Project
// ============================================================================

/// A project grouping endpoints under a shared auth spec.
///
/// # Invariants
/// - `updated_at` >= `created_at`; both are unix milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier.
    pub id: ProjectId,
    /// Project name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional project-wide auth spec.
    pub auth: Option<AuthSpec>,
    /// Creation timestamp in unix milliseconds.
    pub created_at: i64,
    /// Last-update timestamp in unix milliseconds.
    pub updated_at: i64,
}

/// Payload for creating a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProject {
    /// Project name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional project-wide auth spec.
    #[serde(default)]
    pub auth: Option<AuthSpec>,
}

/// Payload for updating project basics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectUpdate {
    /// New project name.
    pub name: String,
    /// New description (clears when absent).
    #[serde(default)]
    pub description: Option<String>,
}

// ============================================================================
// SECTION: Endpoint
// ============================================================================

/// A persisted load target.
///
/// # Invariants
/// - At most one of `requests` and `duration_secs` is set; when neither is
///   set the engine falls back to a budget of 100 requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Endpoint identifier.
    pub id: EndpointId,
    /// Owning project identifier.
    pub project_id: ProjectId,
    /// Endpoint name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Target URL.
    pub url: String,
    /// Target HTTP method.
    pub method: HttpMethod,
    /// Default virtual user count.
    pub users: u32,
    /// Default total request budget.
    pub requests: Option<u64>,
    /// Default wall-clock duration in seconds.
    pub duration_secs: Option<u64>,
    /// Content type for the request body.
    pub content_type: String,
    /// Optional request body.
    pub body: Option<String>,
    /// Skip TLS certificate verification when set.
    pub insecure_tls: bool,
    /// Run the token-fetch preflight when set.
    pub requires_auth: bool,
    /// Optional per-request headers.
    pub headers: Option<BTreeMap<String, String>>,
    /// Optional auth spec overriding the project's.
    pub auth: Option<AuthSpec>,
}

/// Payload for creating or updating an endpoint.
///
/// # Invariants
/// - Same budget/duration exclusivity as [`Endpoint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointSpec {
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
}

/// Returns the default virtual user count.
const fn default_users() -> u32 {
    10
}

// ============================================================================
// SECTION: Ad-Hoc Run Request
// ============================================================================

/// Inline run request carrying a full target description.
///
/// # Invariants
/// - Same budget/duration exclusivity as [`Endpoint`]; neither set means a
///   budget of 100 requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Target URL.
    pub url: String,
    /// Target HTTP method.
    #[serde(default)]
    pub method: HttpMethod,
    /// Virtual user count.
    #[serde(default = "default_users")]
    pub users: u32,
    /// Total request budget.
    #[serde(default)]
    pub requests: Option<u64>,
    /// Wall-clock duration in seconds.
    #[serde(default)]
    pub duration_secs: Option<u64>,
    /// Optional request body.
    #[serde(default)]
    pub body: Option<String>,
    /// Content type for the request body.
    #[serde(default = "default_content_type")]
    pub content_type: String,
    /// Optional per-request headers.
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Skip TLS certificate verification when set.
    #[serde(default)]
    pub insecure_tls: bool,
    /// Optional auth spec for the token-fetch preflight.
    #[serde(default)]
    pub auth: Option<AuthSpec>,
}

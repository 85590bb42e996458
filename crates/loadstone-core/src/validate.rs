// crates/loadstone-core/src/validate.rs
// ============================================================================
// Module: Loadstone Run Validation
// Description: Admission checks applied before a run starts.
// Purpose: Reject malformed run requests without touching engine state.
// Dependencies: crate::{error, model}
// ============================================================================

//! ## Overview
//! Validation runs once at admission. A request carrying both a budget and a
//! duration is rejected; a request carrying neither is accepted and falls
//! back to the engine's default budget of 100 requests.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::error::ValidationError;
use crate::model::RunRequest;

// ============================================================================
// SECTION: Validation
// ============================================================================

/// Validates an ad-hoc run request.
///
/// # Errors
///
/// Returns the first applicable [`ValidationError`].
pub fn validate_run_request(request: &RunRequest) -> Result<(), ValidationError> {
    if request.url.trim().is_empty() {
        return Err(ValidationError::MissingUrl);
    }
    if request.users < 1 {
        return Err(ValidationError::InvalidUsers);
    }
    if request.requests.is_some() && request.duration_secs.is_some() {
        return Err(ValidationError::ConflictingStopCriteria);
    }
    if let Some(requests) = request.requests
        && requests < 1
    {
        return Err(ValidationError::InvalidRequests);
    }
    if let Some(duration_secs) = request.duration_secs
        && duration_secs < 1
    {
        return Err(ValidationError::InvalidDuration);
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HttpMethod;

    fn request() -> RunRequest {
        RunRequest {
            url: "http://127.0.0.1:8080/ping".to_string(),
            method: HttpMethod::Get,
            users: 4,
            requests: Some(100),
            duration_secs: None,
            body: None,
            content_type: "application/json".to_string(),
            headers: None,
            insecure_tls: false,
            auth: None,
        }
    }

    #[test]
    fn accepts_budget_request() {
        assert!(validate_run_request(&request()).is_ok());
    }

    #[test]
    fn accepts_neither_budget_nor_duration() {
        let mut req = request();
        req.requests = None;
        assert!(validate_run_request(&req).is_ok());
    }

    #[test]
    fn rejects_empty_url() {
        let mut req = request();
        req.url = "  ".to_string();
        assert_eq!(validate_run_request(&req), Err(ValidationError::MissingUrl));
    }

    #[test]
    fn rejects_zero_users() {
        let mut req = request();
        req.users = 0;
        assert_eq!(validate_run_request(&req), Err(ValidationError::InvalidUsers));
    }

    #[test]
    fn rejects_budget_and_duration_together() {
        let mut req = request();
        req.duration_secs = Some(5);
        assert_eq!(validate_run_request(&req), Err(ValidationError::ConflictingStopCriteria));
    }

    #[test]
    fn rejects_zero_budget() {
        let mut req = request();
        req.requests = Some(0);
        assert_eq!(validate_run_request(&req), Err(ValidationError::InvalidRequests));
    }

    #[test]
    fn rejects_zero_duration() {
        let mut req = request();
        req.requests = None;
        req.duration_secs = Some(0);
        assert_eq!(validate_run_request(&req), Err(ValidationError::InvalidDuration));
    }
}

//! Static-bearer authentication for the worker trigger and admin surface.
//!
//! Two operator-provisioned credentials gate the write surfaces: the worker
//! token for the drain trigger, and the elevated admin token for DLQ
//! administration and inventory seeding. In debug mode an unset credential
//! disables its check; outside debug mode config validation refuses to
//! start without both.

use axum::http::HeaderMap;

use crate::error::ApiError;

/// Extracts the bearer token from the Authorization header.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Requires a matching bearer credential.
///
/// The tokens are high-entropy operator-provisioned secrets; comparison is
/// an exact match after the scheme prefix is stripped.
///
/// # Errors
///
/// - [`ApiError::missing_auth`] when no bearer token is present
/// - [`ApiError::invalid_token`] on mismatch, or when no credential is
///   configured outside debug mode
pub fn require_bearer(
    headers: &HeaderMap,
    expected: Option<&str>,
    debug: bool,
) -> Result<(), ApiError> {
    let Some(expected) = expected else {
        if debug {
            return Ok(());
        }
        tracing::error!("bearer credential gate reached without a configured token");
        return Err(ApiError::invalid_token());
    };

    let Some(token) = extract_bearer_token(headers) else {
        return Err(ApiError::missing_auth());
    };
    if token != expected {
        return Err(ApiError::invalid_token());
    }
    Ok(())
}

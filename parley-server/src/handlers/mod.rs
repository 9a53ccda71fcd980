//! HTTP and WebSocket request handlers.

pub mod messages;
pub mod rooms;
pub mod socket;
pub mod users;

use axum::http::HeaderMap;

use crate::http::error::ApiError;

/// Header carrying the caller's asserted username.
pub const USERNAME_HEADER: &str = "x-username";

/// Extract the asserted username from request headers.
///
/// Identity is asserted, never verified; a missing or blank header is the
/// only rejection.
pub(crate) fn require_username(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USERNAME_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| ApiError::bad_request("X-Username header is required"))
}

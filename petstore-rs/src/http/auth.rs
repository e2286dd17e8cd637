use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::AppState;

const API_KEY_HEADER: &str = "api_key";

/// Gate every resource handler on the shared token. Runs before any store access.
pub fn ensure_authorized(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    if state.gate.authorize(extract_token(headers)) {
        debug!("authorized request using token");
        return Ok(());
    }

    warn!("unauthorized request");
    Err(ApiError::Unauthorized)
}

/// Token from `Authorization: Bearer <token>`, falling back to the `api_key` header.
pub fn extract_token(headers: &HeaderMap) -> Option<&str> {
    if let Some(raw) = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        let mut parts = raw.split_whitespace();
        if let (Some(scheme), Some(token), None) = (parts.next(), parts.next(), parts.next()) {
            if scheme.eq_ignore_ascii_case("bearer") {
                return Some(token);
            }
        }
    }

    headers
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
}

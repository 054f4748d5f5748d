use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::core::tokens::TokenPolicy;
use crate::errors::AppError;
use crate::state::AppState;

/// Header carrying the shared backend API key on `/session`
pub const API_KEY_HEADER: &str = "x-api-key";

/// Header carrying the caller's user id on `/openai_session`
pub const USER_ID_HEADER: &str = "userid";

/// Value some frontends send when they failed to resolve the user
pub const FRONTEND_ERROR_SENTINEL: &str = "Frontend error";

const INVALID_API_KEY: &str = "Invalid or missing API key";
const INVALID_USER_ID: &str = "Missing or invalid USERID header";

/// Identity of the caller, taken from the `USERID` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerId(pub String);

impl CallerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Compare a presented key against the configured one in constant time.
fn api_key_matches(presented: &[u8], expected: &str) -> bool {
    presented.ct_eq(expected.as_bytes()).into()
}

/// Shared-key check for the token route
///
/// In legacy mode the check is skipped and the request runs under
/// [`TokenPolicy::Legacy`]. Otherwise the `X-API-Key` header must equal the
/// configured backend key, and the request runs under
/// [`TokenPolicy::Authenticated`]. The chosen policy is inserted into the
/// request extensions for the handler.
pub async fn api_key_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.config.legacy_session_token {
        tracing::debug!("Legacy session token mode, skipping API key check");
        request.extensions_mut().insert(TokenPolicy::Legacy);
        return Ok(next.run(request).await);
    }

    let Some(expected) = state.config.backend_api_key.as_deref() else {
        tracing::error!("BACKEND_API_KEY is not configured, rejecting request");
        return Err(AppError::Forbidden(INVALID_API_KEY.to_string()));
    };

    let authorized = request
        .headers()
        .get(API_KEY_HEADER)
        .is_some_and(|value| api_key_matches(value.as_bytes(), expected));

    if !authorized {
        tracing::warn!(
            path = %request.uri().path(),
            "Rejected request with invalid or missing API key"
        );
        return Err(AppError::Forbidden(INVALID_API_KEY.to_string()));
    }

    request.extensions_mut().insert(TokenPolicy::Authenticated);
    Ok(next.run(request).await)
}

/// Extract a usable user id from the raw header bytes.
///
/// Rejects non-UTF-8, empty and the frontend sentinel value.
fn parse_user_id(raw: &[u8]) -> Option<String> {
    let value = std::str::from_utf8(raw).ok()?.trim();
    if value.is_empty() || value == FRONTEND_ERROR_SENTINEL {
        return None;
    }
    Some(value.to_string())
}

/// Caller identity check for the quota-gated route
///
/// Inserts a [`CallerId`] extension, or rejects with 403.
pub async fn user_id_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let user_id = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|value| parse_user_id(value.as_bytes()));

    let Some(user_id) = user_id else {
        tracing::warn!(
            path = %request.uri().path(),
            "Rejected request with missing or invalid USERID header"
        );
        return Err(AppError::Forbidden(INVALID_USER_ID.to_string()));
    };

    tracing::debug!(user_id = %user_id, "Caller identified");
    request.extensions_mut().insert(CallerId(user_id));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_matches() {
        assert!(api_key_matches(b"secret", "secret"));
        assert!(!api_key_matches(b"secret2", "secret"));
        assert!(!api_key_matches(b"", "secret"));
        assert!(!api_key_matches(b"SECRET", "secret"));
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id(b"jensen_123"), Some("jensen_123".to_string()));
        assert_eq!(parse_user_id(b"  u1 "), Some("u1".to_string()));
        assert_eq!(parse_user_id(b""), None);
        assert_eq!(parse_user_id(b"   "), None);
        assert_eq!(parse_user_id(b"Frontend error"), None);
        assert_eq!(parse_user_id(&[0xff, 0xfe]), None);
    }
}

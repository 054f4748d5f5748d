use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::core::quota::QuotaError;
use crate::core::tokens::TokenError;

/// Error returned from request handlers and middleware
///
/// Every variant renders as a JSON body `{"error": "<message>"}` with the
/// status from [`AppError::status_code`].
#[derive(Debug, Error)]
pub enum AppError {
    /// Caller failed the header check
    #[error("{0}")]
    Forbidden(String),

    /// Caller is not a known user
    #[error("{0}")]
    Unauthorized(String),

    /// Caller used up their call quota
    #[error("{0}")]
    QuotaExceeded(String),

    /// Upstream provider rejected the request; status and text are forwarded
    #[error("{message}")]
    Provider { status: StatusCode, message: String },

    /// Upstream provider returned a body we could not use
    #[error("{0}")]
    Parse(String),

    /// Upstream provider could not be reached
    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::QuotaExceeded(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider { status, .. } => *status,
            AppError::Parse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<QuotaError> for AppError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::UserNotFound => AppError::Unauthorized(err.to_string()),
            QuotaError::LimitExceeded { .. } => AppError::QuotaExceeded(err.to_string()),
            QuotaError::UserLookup(_) | QuotaError::LogLookup(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Provider { status, body } => AppError::Provider {
                status: StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY),
                message: body,
            },
            TokenError::Parse(_) => {
                AppError::Parse("Failed to parse provider response".to_string())
            }
            TokenError::Unavailable(_) => {
                AppError::Unavailable("Failed to reach provider".to_string())
            }
            TokenError::InvalidRequest(message) => AppError::Internal(message),
        }
    }
}

/// Result type for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn test_quota_error_mapping() {
        let err: AppError = QuotaError::UserNotFound.into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "User not found");

        let err: AppError = QuotaError::LimitExceeded { used: 50, limit: 50 }.into();
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.to_string(), "Rate limit exceeded");

        let err: AppError =
            QuotaError::UserLookup(StoreError::Transport("connection reset".to_string())).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().starts_with("Database error: "));
    }

    #[test]
    fn test_token_error_mapping() {
        let err: AppError = TokenError::Provider {
            status: 401,
            body: "{\"error\":\"bad key\"}".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "{\"error\":\"bad key\"}");

        let err: AppError = TokenError::Parse("eof".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let err: AppError = TokenError::Unavailable("dns".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_out_of_range_provider_status() {
        let err: AppError = TokenError::Provider {
            status: 1000,
            body: "weird".to_string(),
        }
        .into();
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }
}

use axum::{Extension, Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::core::tokens::{LiveSessionConfig, TokenPolicy};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Response body for `GET /session`
#[derive(Debug, Serialize)]
pub struct SessionTokenResponse {
    pub token: String,
    pub config: LiveSessionConfig,
}

const SESSION_TOKEN_FAILURE: &str = "Failed to create session token";

/// Provider error shown for every Gemini failure, whatever the upstream cause.
fn session_token_failure() -> AppError {
    AppError::Provider {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: SESSION_TOKEN_FAILURE.to_string(),
    }
}

/// Issue a Gemini Live auth token
///
/// The token policy comes from the API key middleware. Provider failures are
/// logged here and reported to the caller as a generic 500.
pub async fn create_session_token(
    State(state): State<Arc<AppState>>,
    Extension(policy): Extension<TokenPolicy>,
) -> AppResult<Json<SessionTokenResponse>> {
    let issued = state.gemini.issue(policy).await.map_err(|e| {
        error!(error = %e, ?policy, "Failed to create Gemini session token");
        session_token_failure()
    })?;

    info!(?policy, "Gemini session token created");

    Ok(Json(SessionTokenResponse {
        token: issued.token,
        config: issued.config,
    }))
}

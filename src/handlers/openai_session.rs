use axum::{Extension, Json, extract::State};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::{call_log, quota};
use crate::errors::AppResult;
use crate::middleware::CallerId;
use crate::state::AppState;

/// Response body for `GET /openai_session`
#[derive(Debug, Serialize)]
pub struct ClientSecretResponse {
    pub client_secret: String,
}

/// Issue an OpenAI Realtime client secret to a user with quota left
///
/// Flow: quota gate, then the provider call, then the call log write. The
/// log write is awaited before responding but its failure does not fail the
/// request. Nothing is logged when the gate or the provider call fails.
pub async fn create_openai_session(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CallerId>,
) -> AppResult<Json<ClientSecretResponse>> {
    let user_id = caller.as_str();

    let usage =
        quota::check_quota(state.store.as_ref(), user_id, state.openai_session_quota()).await?;

    let client_secret = state.openai.issue().await?;

    if !call_log::log_success(state.store.as_ref(), user_id).await {
        warn!(user_id = %user_id, "Client secret issued but the call was not logged");
    }

    info!(
        user_id = %user_id,
        used = usage.used + 1,
        limit = usage.limit,
        "OpenAI Realtime session granted"
    );

    Ok(Json(ClientSecretResponse { client_secret }))
}

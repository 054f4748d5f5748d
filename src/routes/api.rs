use axum::{Router, middleware, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{openai_session, session};
use crate::middleware::{api_key_middleware, user_id_middleware};
use crate::state::AppState;

/// Create the token router
///
/// - `GET /session` behind the `X-API-Key` check (skipped in legacy mode)
/// - `GET /openai_session` behind the `USERID` header check
pub fn create_api_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/session",
            get(session::create_session_token)
                .route_layer(middleware::from_fn_with_state(state, api_key_middleware)),
        )
        .route(
            "/openai_session",
            get(openai_session::create_openai_session)
                .route_layer(middleware::from_fn(user_id_middleware)),
        )
        .layer(TraceLayer::new_for_http())
}

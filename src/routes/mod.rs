//! Route configuration
//!
//! - `api` - Token routes with their header checks
//! - `audio` - WebSocket echo route

pub mod api;
pub mod audio;

use axum::{Router, routing::get};
use std::sync::Arc;

use crate::handlers::api::health_check;
use crate::state::AppState;

/// Assemble every route with state applied
///
/// Cross-cutting layers (CORS, rate limiting, security headers) are added by
/// the binary on top of this router.
pub fn create_app_router(state: Arc<AppState>) -> Router {
    // Public health check route (no auth)
    let public_routes = Router::new().route("/", get(health_check));

    public_routes
        .merge(api::create_api_router(state.clone()))
        .merge(audio::create_audio_router())
        .with_state(state)
}

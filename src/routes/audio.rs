//! Audio WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::audio_echo_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the audio echo router
///
/// # Endpoint
///
/// `GET /ws/audio` - WebSocket upgrade. Each binary frame is echoed back
/// unchanged. Text frames are ignored.
pub fn create_audio_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/audio", get(audio_echo_handler))
        .layer(TraceLayer::new_for_http())
}

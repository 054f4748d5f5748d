//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::{Router, body::Body, http::Request, response::Response};
use serde_json::Value;
use tower::util::ServiceExt;

use voice_relay::{
    ServerConfig, config::StoreBackend, routes, state::AppState, store::CallStore,
};

pub const GEMINI_KEY: &str = "test_gemini_key";
pub const OPENAI_KEY: &str = "test_openai_key";
pub const BACKEND_KEY: &str = "test_backend_key";

/// Minimal configuration pointing both providers at `gemini_url` / `openai_url`
pub fn create_test_config(gemini_url: &str, openai_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        gemini_api_key: Some(GEMINI_KEY.to_string()),
        gemini_base_url: gemini_url.to_string(),
        gemini_model: "gemini-2.0-flash-live-001".to_string(),
        gemini_voice: "Aoede".to_string(),
        gemini_language: "en-US".to_string(),
        gemini_system_instruction: "You are a test assistant.".to_string(),
        openai_api_key: Some(OPENAI_KEY.to_string()),
        openai_base_url: openai_url.to_string(),
        openai_realtime_model: "gpt-realtime".to_string(),
        openai_realtime_voice: "marin".to_string(),
        openai_session_quota: 50,
        backend_api_key: Some(BACKEND_KEY.to_string()),
        legacy_session_token: false,
        store_backend: StoreBackend::Memory,
        google_credentials_path: None,
        firestore_project_id: None,
        firestore_emulator_host: None,
        memory_store_users: Vec::new(),
        cors_allowed_origins: None,
        rate_limit_requests_per_second: 60,
        rate_limit_burst_size: 10,
    }
}

pub fn create_app(config: ServerConfig, store: Arc<dyn CallStore>) -> Router {
    routes::create_app_router(AppState::with_store(config, store))
}

pub async fn get(app: Router, uri: &str, headers: &[(&str, &str)]) -> Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `session` - Gemini Live token issuing (`/session`)
//! - `openai_session` - Quota-gated OpenAI Realtime client secrets (`/openai_session`)
//! - `audio` - Binary WebSocket echo (`/ws/audio`)

pub mod api;
pub mod audio;
pub mod openai_session;
pub mod session;

// Re-export commonly used handlers for convenient access
pub use audio::audio_echo_handler;

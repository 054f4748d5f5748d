pub mod auth;

// Re-export middleware functions
pub use auth::{CallerId, api_key_middleware, user_id_middleware};

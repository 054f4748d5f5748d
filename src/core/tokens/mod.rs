//! Short-lived credentials for realtime voice providers.
//!
//! - [`gemini`] - Gemini Live single-use auth tokens
//! - [`openai`] - OpenAI Realtime client secrets
//!
//! Each issuer makes exactly one outbound request per call and never retries.

pub mod gemini;
pub mod openai;

use thiserror::Error;

pub use gemini::{
    GeminiLiveSettings, GeminiTokenIssuer, IssuedGeminiToken, LiveSessionConfig, Modality,
    SpeechSettings, TokenPolicy,
};
pub use openai::{OpenAIClientSecretIssuer, OpenAIRealtimeSettings};

/// Errors raised while requesting a credential from a provider.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The provider answered with a non-success status
    #[error("Provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    /// The provider answered successfully but the body was unusable
    #[error("Malformed provider response: {0}")]
    Parse(String),

    /// The provider could not be reached
    #[error("Provider unreachable: {0}")]
    Unavailable(String),

    /// The request could not be built
    #[error("Invalid token request: {0}")]
    InvalidRequest(String),
}

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Join a configured base URL and an API path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

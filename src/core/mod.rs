pub mod call_log;
pub mod quota;
pub mod tokens;

// Re-export commonly used types for convenience
pub use call_log::{log_initial_request, log_success};
pub use quota::{QuotaError, QuotaUsage, check_quota};
pub use tokens::{
    GeminiLiveSettings, GeminiTokenIssuer, IssuedGeminiToken, LiveSessionConfig,
    OpenAIClientSecretIssuer, OpenAIRealtimeSettings, TokenError, TokenPolicy, TokenResult,
};

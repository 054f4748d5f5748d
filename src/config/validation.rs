use super::{ServerConfig, StoreBackend};

/// Checks that hold for every command, server or admin.
pub fn validate_config(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_session_quota(config.openai_session_quota)?;
    validate_rate_limit(
        config.rate_limit_requests_per_second,
        config.rate_limit_burst_size,
    )?;
    Ok(())
}

/// The quota is a lifetime count of granted sessions; zero would lock everyone out.
pub fn validate_session_quota(quota: u32) -> Result<(), Box<dyn std::error::Error>> {
    if quota == 0 {
        return Err("OPENAI_SESSION_QUOTA must be at least 1".into());
    }
    Ok(())
}

pub fn validate_rate_limit(rps: u32, burst: u32) -> Result<(), Box<dyn std::error::Error>> {
    if rps == 0 {
        return Err("RATE_LIMIT_REQUESTS_PER_SECOND must be at least 1".into());
    }
    if burst == 0 {
        return Err("RATE_LIMIT_BURST_SIZE must be at least 1".into());
    }
    Ok(())
}

/// Credentials required before the HTTP server may start.
///
/// - both provider API keys
/// - `BACKEND_API_KEY`, unless `/session` runs in legacy mode
/// - for Firestore, a credentials file or an emulator host
pub fn validate_server_credentials(
    config: &ServerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if config.gemini_api_key.is_none() {
        return Err("GEMINI_API_KEY is required".into());
    }
    if config.openai_api_key.is_none() {
        return Err("OPENAI_API_KEY is required".into());
    }
    if config.requires_backend_api_key() && config.backend_api_key.is_none() {
        return Err("BACKEND_API_KEY is required unless LEGACY_SESSION_TOKEN=true".into());
    }
    validate_store(config)
}

/// Store settings needed to build the configured backend.
pub fn validate_store(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.store_backend != StoreBackend::Firestore {
        return Ok(());
    }

    match (&config.firestore_emulator_host, &config.google_credentials_path) {
        (Some(_), _) if config.firestore_project_id.is_none() => {
            Err("FIRESTORE_PROJECT_ID is required when FIRESTORE_EMULATOR_HOST is set".into())
        }
        (Some(_), _) => Ok(()),
        (None, Some(_)) => Ok(()),
        (None, None) => Err(
            "GOOGLE_APPLICATION_CREDENTIALS is required for the firestore store backend".into(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 5010,
            tls: None,
            gemini_api_key: Some("gm-key".to_string()),
            gemini_base_url: "http://localhost".to_string(),
            gemini_model: "gemini-2.0-flash-live-001".to_string(),
            gemini_voice: "Aoede".to_string(),
            gemini_language: "en-US".to_string(),
            gemini_system_instruction: "Be brief.".to_string(),
            openai_api_key: Some("sk-key".to_string()),
            openai_base_url: "http://localhost".to_string(),
            openai_realtime_model: "gpt-realtime".to_string(),
            openai_realtime_voice: "marin".to_string(),
            openai_session_quota: 50,
            backend_api_key: Some("backend".to_string()),
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

    #[test]
    fn test_valid_server_credentials() {
        assert!(validate_server_credentials(&test_config()).is_ok());
    }

    #[test]
    fn test_missing_provider_keys() {
        let mut config = test_config();
        config.gemini_api_key = None;
        let err = validate_server_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let mut config = test_config();
        config.openai_api_key = None;
        let err = validate_server_credentials(&config).unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }

    #[test]
    fn test_backend_key_optional_in_legacy_mode() {
        let mut config = test_config();
        config.backend_api_key = None;
        assert!(validate_server_credentials(&config).is_err());

        config.legacy_session_token = true;
        assert!(validate_server_credentials(&config).is_ok());
    }

    #[test]
    fn test_firestore_requires_credentials_or_emulator() {
        let mut config = test_config();
        config.store_backend = StoreBackend::Firestore;
        assert!(validate_store(&config).is_err());

        config.google_credentials_path = Some(PathBuf::from("/secrets/sa.json"));
        assert!(validate_store(&config).is_ok());

        config.google_credentials_path = None;
        config.firestore_emulator_host = Some("localhost:8081".to_string());
        assert!(validate_store(&config).is_err());

        config.firestore_project_id = Some("demo".to_string());
        assert!(validate_store(&config).is_ok());
    }

    #[test]
    fn test_session_quota_and_rate_limit() {
        assert!(validate_session_quota(0).is_err());
        assert!(validate_session_quota(1).is_ok());
        assert!(validate_rate_limit(0, 10).is_err());
        assert!(validate_rate_limit(60, 0).is_err());
        assert!(validate_rate_limit(60, 10).is_ok());
    }
}

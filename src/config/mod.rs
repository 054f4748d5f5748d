//! Configuration module for the voice relay server
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//! - `utils`: Utility functions for configuration parsing
//!
//! # Example
//! ```rust,no_run
//! use voice_relay::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

mod merge;
mod utils;
mod validation;
mod yaml;

pub use validation::{validate_server_credentials, validate_store};

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";
/// Default bind port
pub const DEFAULT_PORT: u16 = 5010;
/// Default lifetime number of provider B sessions per user
pub const DEFAULT_OPENAI_SESSION_QUOTA: u32 = 50;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Which [`CallStore`](crate::store::CallStore) backend to build at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Cloud Firestore over REST
    #[default]
    Firestore,
    /// Process-local store, contents are lost on exit
    Memory,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Firestore => "firestore",
            Self::Memory => "memory",
        }
    }
}

impl fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "firestore" => Ok(Self::Firestore),
            "memory" => Ok(Self::Memory),
            other => Err(format!(
                "Unknown store backend '{other}' (expected 'firestore' or 'memory')"
            )),
        }
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the relay, including:
/// - Server settings (host, port, TLS)
/// - Provider credentials and live session settings (Gemini, OpenAI)
/// - Backend API key and the legacy `/session` mode
/// - Store backend selection and Firestore credentials
/// - Security settings (CORS, rate limiting)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Gemini Live (provider A)
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub gemini_model: String,
    pub gemini_voice: String,
    pub gemini_language: String,
    pub gemini_system_instruction: String,

    // OpenAI Realtime (provider B)
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub openai_realtime_model: String,
    pub openai_realtime_voice: String,
    /// Lifetime number of `/openai_session` grants per user
    pub openai_session_quota: u32,

    // Authentication
    /// Shared key expected in the `X-API-Key` header on `/session`
    pub backend_api_key: Option<String>,
    /// Serve `/session` without the API key check (reduced token uses)
    pub legacy_session_token: bool,

    // Store
    pub store_backend: StoreBackend,
    /// Path to a service-account JSON key file
    pub google_credentials_path: Option<PathBuf>,
    /// Overrides the project id from the credentials file
    pub firestore_project_id: Option<String>,
    /// `host:port` of a Firestore emulator (plain HTTP, no real credentials)
    pub firestore_emulator_host: Option<String>,
    /// User ids seeded into the memory backend at startup
    pub memory_store_users: Vec<String>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,

    // Rate limiting configuration
    /// Maximum requests per second per IP address
    /// Default: 60
    pub rate_limit_requests_per_second: u32,
    /// Maximum burst size for rate limiting
    /// Default: 10
    pub rate_limit_burst_size: u32,
}

/// Zeroize secret fields when the configuration is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.backend_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults. Note that the .env file is loaded
    /// in main.rs, so its values are already visible as environment variables.
    ///
    /// # Errors
    /// Returns an error if an environment variable has an invalid format or
    /// the resulting configuration fails validation.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Whether `/session` requires the backend API key
    pub fn requires_backend_api_key(&self) -> bool {
        !self.legacy_session_token
    }

    /// Base URL for Firestore requests
    ///
    /// The emulator speaks plain HTTP on `FIRESTORE_EMULATOR_HOST`.
    pub fn firestore_base_url(&self) -> String {
        match &self.firestore_emulator_host {
            Some(host) => format!("http://{host}"),
            None => crate::store::firestore::FIRESTORE_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    const ENV_VARS: &[&str] = &[
        "HOST",
        "PORT",
        "TLS_CERT_PATH",
        "TLS_KEY_PATH",
        "GEMINI_API_KEY",
        "GEMINI_BASE_URL",
        "GEMINI_MODEL",
        "GEMINI_VOICE",
        "GEMINI_LANGUAGE",
        "GEMINI_SYSTEM_INSTRUCTION",
        "OPENAI_API_KEY",
        "OPENAI_BASE_URL",
        "OPENAI_REALTIME_MODEL",
        "OPENAI_REALTIME_VOICE",
        "OPENAI_SESSION_QUOTA",
        "BACKEND_API_KEY",
        "LEGACY_SESSION_TOKEN",
        "STORE_BACKEND",
        "GOOGLE_APPLICATION_CREDENTIALS",
        "FIRESTORE_PROJECT_ID",
        "FIRESTORE_EMULATOR_HOST",
        "MEMORY_STORE_USERS",
        "CORS_ALLOWED_ORIGINS",
        "RATE_LIMIT_REQUESTS_PER_SECOND",
        "RATE_LIMIT_BURST_SIZE",
    ];

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for var in ENV_VARS {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.address(), "0.0.0.0:5010");
        assert!(!config.is_tls_enabled());
        assert_eq!(config.gemini_model, "gemini-2.0-flash-live-001");
        assert_eq!(config.gemini_voice, "Aoede");
        assert_eq!(config.gemini_language, "en-US");
        assert_eq!(config.openai_realtime_model, "gpt-realtime");
        assert_eq!(config.openai_realtime_voice, "marin");
        assert_eq!(config.openai_session_quota, 50);
        assert_eq!(config.store_backend, StoreBackend::Firestore);
        assert!(config.requires_backend_api_key());
        assert_eq!(config.rate_limit_requests_per_second, 60);
        assert_eq!(config.rate_limit_burst_size, 10);
        assert_eq!(
            config.firestore_base_url(),
            "https://firestore.googleapis.com"
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "8080");
            env::set_var("GEMINI_API_KEY", "gm-key");
            env::set_var("OPENAI_API_KEY", "sk-key");
            env::set_var("OPENAI_SESSION_QUOTA", "3");
            env::set_var("LEGACY_SESSION_TOKEN", "true");
            env::set_var("STORE_BACKEND", "memory");
            env::set_var("MEMORY_STORE_USERS", "u1, u2,,u3");
            env::set_var("FIRESTORE_EMULATOR_HOST", "localhost:8081");
        }

        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.gemini_api_key.as_deref(), Some("gm-key"));
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-key"));
        assert_eq!(config.openai_session_quota, 3);
        assert!(!config.requires_backend_api_key());
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.memory_store_users, vec!["u1", "u2", "u3"]);
        assert_eq!(config.firestore_base_url(), "http://localhost:8081");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_port() {
        cleanup_env_vars();

        unsafe {
            env::set_var("PORT", "not-a-port");
        }

        let result = ServerConfig::from_env();
        assert!(result.unwrap_err().to_string().contains("PORT"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_zero_quota_rejected() {
        cleanup_env_vars();

        unsafe {
            env::set_var("OPENAI_SESSION_QUOTA", "0");
        }

        let result = ServerConfig::from_env();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("OPENAI_SESSION_QUOTA")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_unknown_store_backend() {
        cleanup_env_vars();

        unsafe {
            env::set_var("STORE_BACKEND", "redis");
        }

        let result = ServerConfig::from_env();
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Unknown store backend")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_tls_requires_both_paths() {
        cleanup_env_vars();

        unsafe {
            env::set_var("TLS_CERT_PATH", "/etc/ssl/cert.pem");
        }
        assert!(ServerConfig::from_env().is_err());

        unsafe {
            env::set_var("TLS_KEY_PATH", "/etc/ssl/key.pem");
        }
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(
            config.tls,
            Some(TlsConfig {
                cert_path: PathBuf::from("/etc/ssl/cert.pem"),
                key_path: PathBuf::from("/etc/ssl/key.pem"),
            })
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_only() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"
  port: 8080

providers:
  gemini:
    api_key: "yaml-gm-key"
    voice: "Puck"
  openai:
    api_key: "yaml-sk-key"
    realtime_voice: "verse"

auth:
  backend_api_key: "yaml-backend-key"

quota:
  openai_session_limit: 5

store:
  backend: "memory"
  memory_users: ["alice", "bob"]
"#;

        fs::write(&config_path, yaml_content).unwrap();

        let config = ServerConfig::from_file(&config_path).unwrap();

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.gemini_api_key.as_deref(), Some("yaml-gm-key"));
        assert_eq!(config.gemini_voice, "Puck");
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-sk-key"));
        assert_eq!(config.openai_realtime_voice, "verse");
        assert_eq!(config.backend_api_key.as_deref(), Some("yaml-backend-key"));
        assert_eq!(config.openai_session_quota, 5);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.memory_store_users, vec!["alice", "bob"]);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml_content = r#"
server:
  host: "127.0.0.1"

providers:
  openai:
    api_key: "yaml-key"
"#;

        fs::write(&config_path, yaml_content).unwrap();

        unsafe {
            env::set_var("HOST", "10.0.0.1");
            env::set_var("PORT", "9000");
            env::set_var("OPENAI_API_KEY", "env-key");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.openai_api_key.as_deref(), Some("yaml-key"));
        // ENV value
        assert_eq!(config.port, 9000);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let config_path = PathBuf::from("/nonexistent/config.yaml");
        let result = ServerConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_invalid_yaml() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("invalid.yaml");

        fs::write(&config_path, "invalid: yaml: [content").unwrap();

        let result = ServerConfig::from_file(&config_path);

        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to parse YAML")
        );

        cleanup_env_vars();
    }

    #[test]
    fn test_store_backend_from_str() {
        assert_eq!("Firestore".parse::<StoreBackend>(), Ok(StoreBackend::Firestore));
        assert_eq!(" memory ".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }
}

use std::path::PathBuf;

use super::utils::{env_bool, env_parse, env_string, non_empty, parse_list};
use super::yaml::YamlConfig;
use super::{
    DEFAULT_HOST, DEFAULT_OPENAI_SESSION_QUOTA, DEFAULT_PORT, ServerConfig, StoreBackend,
    TlsConfig,
};
use crate::core::tokens::gemini::{
    DEFAULT_GEMINI_LANGUAGE, DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_VOICE,
    DEFAULT_SYSTEM_INSTRUCTION, GEMINI_BASE_URL,
};
use crate::core::tokens::openai::{
    DEFAULT_REALTIME_MODEL, DEFAULT_REALTIME_VOICE, OPENAI_BASE_URL,
};

const DEFAULT_RATE_LIMIT_RPS: u32 = 60;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

/// Build a [`ServerConfig`] from environment variables with optional YAML overrides
///
/// Each field resolves as YAML value, then environment variable, then default.
pub fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    let server = yaml.server.unwrap_or_default();
    let providers = yaml.providers.unwrap_or_default();
    let gemini = providers.gemini.unwrap_or_default();
    let openai = providers.openai.unwrap_or_default();
    let auth = yaml.auth.unwrap_or_default();
    let quota = yaml.quota.unwrap_or_default();
    let store = yaml.store.unwrap_or_default();
    let security = yaml.security.unwrap_or_default();

    let host = non_empty(server.host)
        .or_else(|| env_string("HOST"))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = match server.port {
        Some(port) => port,
        None => env_parse::<u16>("PORT")?.unwrap_or(DEFAULT_PORT),
    };

    let tls = merge_tls(server.tls)?;

    let store_backend = match non_empty(store.backend).or_else(|| env_string("STORE_BACKEND")) {
        Some(raw) => raw.parse::<StoreBackend>()?,
        None => StoreBackend::default(),
    };

    let memory_store_users = match store.memory_users {
        Some(users) => users
            .into_iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .collect(),
        None => env_string("MEMORY_STORE_USERS")
            .map(|raw| parse_list(&raw))
            .unwrap_or_default(),
    };

    let legacy_session_token = match auth.legacy_session_token {
        Some(flag) => flag,
        None => env_bool("LEGACY_SESSION_TOKEN")?.unwrap_or(false),
    };

    let openai_session_quota = match quota.openai_session_limit {
        Some(limit) => limit,
        None => {
            env_parse::<u32>("OPENAI_SESSION_QUOTA")?.unwrap_or(DEFAULT_OPENAI_SESSION_QUOTA)
        }
    };

    let rate_limit_requests_per_second = match security.rate_limit_requests_per_second {
        Some(rps) => rps,
        None => env_parse::<u32>("RATE_LIMIT_REQUESTS_PER_SECOND")?
            .unwrap_or(DEFAULT_RATE_LIMIT_RPS),
    };
    let rate_limit_burst_size = match security.rate_limit_burst_size {
        Some(burst) => burst,
        None => env_parse::<u32>("RATE_LIMIT_BURST_SIZE")?.unwrap_or(DEFAULT_RATE_LIMIT_BURST),
    };

    Ok(ServerConfig {
        host,
        port,
        tls,

        gemini_api_key: non_empty(gemini.api_key).or_else(|| env_string("GEMINI_API_KEY")),
        gemini_base_url: non_empty(gemini.base_url)
            .or_else(|| env_string("GEMINI_BASE_URL"))
            .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
        gemini_model: non_empty(gemini.model)
            .or_else(|| env_string("GEMINI_MODEL"))
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
        gemini_voice: non_empty(gemini.voice)
            .or_else(|| env_string("GEMINI_VOICE"))
            .unwrap_or_else(|| DEFAULT_GEMINI_VOICE.to_string()),
        gemini_language: non_empty(gemini.language)
            .or_else(|| env_string("GEMINI_LANGUAGE"))
            .unwrap_or_else(|| DEFAULT_GEMINI_LANGUAGE.to_string()),
        gemini_system_instruction: non_empty(gemini.system_instruction)
            .or_else(|| env_string("GEMINI_SYSTEM_INSTRUCTION"))
            .unwrap_or_else(|| DEFAULT_SYSTEM_INSTRUCTION.to_string()),

        openai_api_key: non_empty(openai.api_key).or_else(|| env_string("OPENAI_API_KEY")),
        openai_base_url: non_empty(openai.base_url)
            .or_else(|| env_string("OPENAI_BASE_URL"))
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string()),
        openai_realtime_model: non_empty(openai.realtime_model)
            .or_else(|| env_string("OPENAI_REALTIME_MODEL"))
            .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
        openai_realtime_voice: non_empty(openai.realtime_voice)
            .or_else(|| env_string("OPENAI_REALTIME_VOICE"))
            .unwrap_or_else(|| DEFAULT_REALTIME_VOICE.to_string()),
        openai_session_quota,

        backend_api_key: non_empty(auth.backend_api_key).or_else(|| env_string("BACKEND_API_KEY")),
        legacy_session_token,

        store_backend,
        google_credentials_path: non_empty(store.credentials_path)
            .or_else(|| env_string("GOOGLE_APPLICATION_CREDENTIALS"))
            .map(PathBuf::from),
        firestore_project_id: non_empty(store.project_id)
            .or_else(|| env_string("FIRESTORE_PROJECT_ID")),
        firestore_emulator_host: non_empty(store.emulator_host)
            .or_else(|| env_string("FIRESTORE_EMULATOR_HOST")),
        memory_store_users,

        cors_allowed_origins: non_empty(security.cors_allowed_origins)
            .or_else(|| env_string("CORS_ALLOWED_ORIGINS")),
        rate_limit_requests_per_second,
        rate_limit_burst_size,
    })
}

fn merge_tls(
    yaml: Option<super::yaml::TlsYaml>,
) -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    let yaml = yaml.unwrap_or_default();
    if yaml.enabled == Some(false) {
        return Ok(None);
    }

    let cert_path = non_empty(yaml.cert_path).or_else(|| env_string("TLS_CERT_PATH"));
    let key_path = non_empty(yaml.key_path).or_else(|| env_string("TLS_KEY_PATH"));

    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) if yaml.enabled == Some(true) => {
            Err("TLS is enabled but no certificate or key path is configured".into())
        }
        (None, None) => Ok(None),
        _ => Err(
            "TLS requires both a certificate path (TLS_CERT_PATH) and a key path (TLS_KEY_PATH)"
                .into(),
        ),
    }
}

//! Process-scoped shared dependencies.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::config::{ServerConfig, StoreBackend};
use crate::core::tokens::{
    GeminiLiveSettings, GeminiTokenIssuer, OpenAIClientSecretIssuer, OpenAIRealtimeSettings,
};
use crate::store::firestore::auth::{
    AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenSource,
};
use crate::store::firestore::EMULATOR_TOKEN;
use crate::store::{CallStore, FirestoreStore, MemoryStore, StoreError, StoreResult};

const HTTP_TIMEOUT_SECS: u64 = 30;
const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("voice-relay/", env!("CARGO_PKG_VERSION"));

/// Application state shared by every request
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn CallStore>,
    pub gemini: GeminiTokenIssuer,
    pub openai: OpenAIClientSecretIssuer,
}

impl AppState {
    /// Build state from configuration, constructing the configured store backend.
    pub fn new(config: ServerConfig) -> StoreResult<Arc<Self>> {
        let client = http_client()?;
        let store = build_store(&config, client.clone())?;
        info!(backend = store.backend_name(), "Call store ready");
        Ok(Self::assemble(config, store, client))
    }

    /// Build state around an existing store.
    pub fn with_store(config: ServerConfig, store: Arc<dyn CallStore>) -> Arc<Self> {
        Self::assemble(config, store, reqwest::Client::new())
    }

    fn assemble(
        config: ServerConfig,
        store: Arc<dyn CallStore>,
        client: reqwest::Client,
    ) -> Arc<Self> {
        let gemini = GeminiTokenIssuer::new(
            client.clone(),
            config.gemini_base_url.clone(),
            config.gemini_api_key.clone().unwrap_or_default(),
            GeminiLiveSettings {
                model: config.gemini_model.clone(),
                voice: config.gemini_voice.clone(),
                language: config.gemini_language.clone(),
                system_instruction: config.gemini_system_instruction.clone(),
            },
        );

        let openai = OpenAIClientSecretIssuer::new(
            client,
            config.openai_base_url.clone(),
            config.openai_api_key.clone().unwrap_or_default(),
            OpenAIRealtimeSettings {
                model: config.openai_realtime_model.clone(),
                voice: config.openai_realtime_voice.clone(),
            },
        );

        Arc::new(Self {
            config,
            store,
            gemini,
            openai,
        })
    }

    /// Lifetime `/openai_session` grants allowed per user.
    pub fn openai_session_quota(&self) -> usize {
        self.config.openai_session_quota as usize
    }
}

/// Shared outbound HTTP client for providers and the store.
pub fn http_client() -> StoreResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECS))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {e}")))
}

/// Construct the store backend selected by `config`.
pub fn build_store(
    config: &ServerConfig,
    client: reqwest::Client,
) -> StoreResult<Arc<dyn CallStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!(
                users = config.memory_store_users.len(),
                "Using in-memory call store"
            );
            Ok(Arc::new(MemoryStore::with_users(
                config.memory_store_users.iter().cloned(),
            )))
        }
        StoreBackend::Firestore => build_firestore(config, client).map(|s| s as Arc<dyn CallStore>),
    }
}

fn build_firestore(
    config: &ServerConfig,
    client: reqwest::Client,
) -> StoreResult<Arc<FirestoreStore>> {
    let base_url = config.firestore_base_url();

    if let Some(host) = &config.firestore_emulator_host {
        let project_id = config.firestore_project_id.clone().ok_or_else(|| {
            StoreError::Config(
                "FIRESTORE_PROJECT_ID is required when FIRESTORE_EMULATOR_HOST is set".to_string(),
            )
        })?;
        info!(host = %host, project_id = %project_id, "Using Firestore emulator");
        let tokens: Arc<dyn AccessTokenSource> = Arc::new(StaticTokenSource::new(EMULATOR_TOKEN));
        return FirestoreStore::new(client, &base_url, project_id, tokens).map(Arc::new);
    }

    let path = config.google_credentials_path.as_ref().ok_or_else(|| {
        StoreError::Config(
            "GOOGLE_APPLICATION_CREDENTIALS is required for the firestore store backend"
                .to_string(),
        )
    })?;
    let key = ServiceAccountKey::from_file(path)?;

    let project_id = config
        .firestore_project_id
        .clone()
        .or_else(|| key.project_id().map(str::to_string))
        .ok_or_else(|| {
            StoreError::Config(
                "No Firestore project id: set FIRESTORE_PROJECT_ID or use a key file with project_id"
                    .to_string(),
            )
        })?;

    let tokens = ServiceAccountTokenSource::new(key)?;
    info!(
        project_id = %project_id,
        client_email = %tokens.client_email(),
        "Using Firestore call store"
    );

    FirestoreStore::new(client, &base_url, project_id, Arc::new(tokens)).map(Arc::new)
}

//! OAuth2 access tokens for Firestore.
//!
//! Production credentials come from a service-account key file and are
//! managed by `google-cloud-auth`, which mints, caches and refreshes the
//! bearer token. The Firestore emulator accepts any bearer token, so
//! [`StaticTokenSource`] is used there.

use async_trait::async_trait;
use google_cloud_auth::credentials::service_account::{AccessSpecifier, Builder};
use google_cloud_auth::credentials::{CacheableResource, Credentials};
use http::{Extensions, header::AUTHORIZATION};
use serde_json::Value;
use std::path::Path;
use tracing::debug;

use crate::store::{StoreError, StoreResult};

/// OAuth scope granting Firestore read/write access.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Source of bearer tokens for store requests.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> StoreResult<String>;
}

/// Fixed token, for the Firestore emulator.
#[derive(Debug, Clone)]
pub struct StaticTokenSource(String);

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> StoreResult<String> {
        Ok(self.0.clone())
    }
}

/// Parsed service-account key file.
#[derive(Clone)]
pub struct ServiceAccountKey(Value);

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("project_id", &self.project_id())
            .field("client_email", &self.client_email())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text.
    pub fn from_json(json: &str) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| StoreError::Config(format!("Invalid service account key: {e}")))?;
        if !value.is_object() {
            return Err(StoreError::Config(
                "Invalid service account key: expected a JSON object".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// Read and parse a key file.
    pub fn from_file(path: &Path) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!(
                "Failed to read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&contents)
    }

    pub fn project_id(&self) -> Option<&str> {
        self.0.get("project_id").and_then(Value::as_str)
    }

    pub fn client_email(&self) -> Option<&str> {
        self.0.get("client_email").and_then(Value::as_str)
    }
}

/// Service-account credentials scoped to Firestore.
pub struct ServiceAccountTokenSource {
    credentials: Credentials,
    client_email: String,
}

impl ServiceAccountTokenSource {
    /// Build credentials from `key`. Fails if the key is not a usable
    /// service-account key.
    pub fn new(key: ServiceAccountKey) -> StoreResult<Self> {
        let client_email = key.client_email().unwrap_or_default().to_string();
        let credentials = Builder::new(key.0)
            .with_access_specifier(AccessSpecifier::from_scopes([DATASTORE_SCOPE]))
            .build()
            .map_err(|e| StoreError::Config(format!("Invalid service account key: {e}")))?;

        Ok(Self {
            credentials,
            client_email,
        })
    }

    pub fn client_email(&self) -> &str {
        &self.client_email
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> StoreResult<String> {
        let headers = match self.credentials.headers(Extensions::new()).await {
            Ok(CacheableResource::New { data, .. }) => data,
            Ok(CacheableResource::NotModified) => {
                return Err(StoreError::Auth(
                    "Credentials returned no authorization headers".to_string(),
                ));
            }
            Err(e) => {
                return Err(StoreError::Auth(format!(
                    "Failed to obtain Firestore access token: {e}"
                )));
            }
        };

        let value = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| StoreError::Auth("Credentials produced no bearer token".to_string()))?;

        let token = value.strip_prefix("Bearer ").unwrap_or(value);
        debug!(client_email = %self.client_email, "Firestore access token ready");
        Ok(token.to_string())
    }
}

//! Cloud Firestore backend over the v1 REST API.
//!
//! Reads use `GET .../documents/{path}` and `:runQuery`. Every write goes
//! through `documents:commit` so that timestamps can be assigned by the
//! server with a `REQUEST_TIME` field transform.

pub mod auth;
pub mod value;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::debug;
use url::Url;

pub use auth::{
    AccessTokenSource, DATASTORE_SCOPE, ServiceAccountKey, ServiceAccountTokenSource,
    StaticTokenSource,
};

use super::{
    CallLogEntry, CallLogKind, CallStore, REQUEST_LOG_COLLECTION, SESSIONS_COLLECTION,
    SessionStatus, StoreError, StoreResult, USERS_COLLECTION, UserProfile, UserRecord,
    validate_document_id,
};
use value::{
    boolean_value, field_str, fields_to_plain, reference_value, server_timestamp, string_value,
};

/// Public Firestore endpoint.
pub const FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com";

/// Database used when none is configured.
pub const DEFAULT_DATABASE_ID: &str = "(default)";

/// Token accepted by the Firestore emulator.
pub const EMULATOR_TOKEN: &str = "owner";

/// Length of generated document ids, matching Firestore auto-ids.
const AUTO_ID_LEN: usize = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    #[serde(default)]
    document: Option<Document>,
}

/// Firestore-backed [`CallStore`].
pub struct FirestoreStore {
    client: reqwest::Client,
    base_url: Url,
    project_id: String,
    database_id: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FirestoreStore {
    /// Create a store for `project_id`.
    ///
    /// `base_url` is [`FIRESTORE_BASE_URL`] in production, or
    /// `http://{FIRESTORE_EMULATOR_HOST}` for the emulator.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        project_id: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> StoreResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| StoreError::Config(format!("Invalid Firestore URL {base_url:?}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Config(format!(
                "Firestore URL cannot be a base: {base_url}"
            )));
        }

        let project_id = project_id.into();
        if project_id.is_empty() {
            return Err(StoreError::Config("Firestore project id is empty".to_string()));
        }

        Ok(Self {
            client,
            base_url,
            project_id,
            database_id: DEFAULT_DATABASE_ID.to_string(),
            tokens,
        })
    }

    /// Full resource name of a document, e.g.
    /// `projects/p/databases/(default)/documents/users/u1`.
    pub fn document_name(&self, relative_path: &str) -> String {
        format!(
            "projects/{}/databases/{}/documents/{}",
            self.project_id, self.database_id, relative_path
        )
    }

    /// Build `{base}/v1/projects/{p}/databases/{d}/{tail...}` with each tail
    /// element percent-encoded as one path segment.
    fn api_url(&self, tail: &[&str]) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| StoreError::Config("Firestore URL cannot be a base".to_string()))?;
            segments.pop_if_empty().extend([
                "v1",
                "projects",
                self.project_id.as_str(),
                "databases",
                self.database_id.as_str(),
            ]);
            segments.extend(tail);
        }
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> StoreResult<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))
    }

    async fn backend_error(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        StoreError::Backend { status, message }
    }

    async fn get_document(&self, collection: &str, id: &str) -> StoreResult<Option<Document>> {
        validate_document_id(id)?;
        let url = self.api_url(&["documents", collection, id])?;
        debug!(%url, "Firestore get");

        let response = self.send(self.client.get(url)).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<Document>()
                .await
                .map(Some)
                .map_err(|e| StoreError::Decode(e.to_string())),
            _ => Err(Self::backend_error(response).await),
        }
    }

    async fn commit(&self, writes: Vec<Value>) -> StoreResult<()> {
        let url = self.api_url(&["documents:commit"])?;
        let body = json!({ "writes": writes });

        let response = self.send(self.client.post(url).json(&body)).await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::backend_error(response).await)
        }
    }

    fn session_name(&self, user_id: &str) -> String {
        self.document_name(&format!("{SESSIONS_COLLECTION}/{user_id}"))
    }

    fn user_name(&self, user_id: &str) -> String {
        self.document_name(&format!("{USERS_COLLECTION}/{user_id}"))
    }
}

fn auto_id() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(AUTO_ID_LEN)
        .collect()
}

fn last_segment(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

#[async_trait]
impl CallStore for FirestoreStore {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserRecord>> {
        Ok(self
            .get_document(USERS_COLLECTION, user_id)
            .await?
            .map(|doc| UserRecord {
                id: user_id.to_string(),
                fields: fields_to_plain(&doc.fields),
            }))
    }

    async fn put_user(&self, user_id: &str, profile: &UserProfile) -> StoreResult<()> {
        validate_document_id(user_id)?;

        let mut fields = Map::new();
        if let Some(name) = &profile.name {
            fields.insert("name".to_string(), string_value(name));
        }
        if let Some(email) = &profile.email {
            fields.insert("email".to_string(), string_value(email));
        }
        fields.insert(
            "premiumMember".to_string(),
            boolean_value(profile.premium_member),
        );

        self.commit(vec![json!({
            "update": { "name": self.user_name(user_id), "fields": fields },
            "updateTransforms": [server_timestamp("createdAt")]
        })])
        .await
    }

    async fn session_exists(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .get_document(SESSIONS_COLLECTION, user_id)
            .await?
            .is_some())
    }

    async fn list_call_logs(&self, user_id: &str, limit: usize) -> StoreResult<Vec<CallLogEntry>> {
        validate_document_id(user_id)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = self.api_url(&[
            "documents",
            SESSIONS_COLLECTION,
            &format!("{user_id}:runQuery"),
        ])?;
        let limit = i32::try_from(limit).unwrap_or(i32::MAX);
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": REQUEST_LOG_COLLECTION }],
                "limit": limit
            }
        });

        let response = self.send(self.client.post(url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(Self::backend_error(response).await);
        }

        let items: Vec<RunQueryItem> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        Ok(items
            .into_iter()
            .filter_map(|item| item.document)
            .map(|doc| CallLogEntry {
                id: last_segment(&doc.name).to_string(),
                kind: CallLogKind::parse(field_str(&doc.fields, "type").unwrap_or_default()),
                time: field_str(&doc.fields, "Time").map(str::to_string),
            })
            .collect())
    }

    async fn put_session(&self, user_id: &str, status: SessionStatus) -> StoreResult<()> {
        validate_document_id(user_id)?;

        // No updateMask: the document is replaced as a whole.
        self.commit(vec![json!({
            "update": {
                "name": self.session_name(user_id),
                "fields": {
                    "status": string_value(status.as_str()),
                    "user_id_ref": reference_value(&self.user_name(user_id)),
                }
            },
            "updateTransforms": [server_timestamp("session_start_time")]
        })])
        .await
    }

    async fn append_call_log(&self, user_id: &str, kind: &CallLogKind) -> StoreResult<String> {
        validate_document_id(user_id)?;

        let id = auto_id();
        let name = format!(
            "{}/{REQUEST_LOG_COLLECTION}/{id}",
            self.session_name(user_id)
        );

        self.commit(vec![json!({
            "update": {
                "name": name,
                "fields": { "type": string_value(kind.as_str()) }
            },
            "updateTransforms": [server_timestamp("Time")],
            "currentDocument": { "exists": false }
        })])
        .await?;

        Ok(id)
    }

    fn backend_name(&self) -> &'static str {
        "firestore"
    }
}

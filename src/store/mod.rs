//! User and call-quota document store.
//!
//! The store holds three kinds of documents:
//!
//! ```text
//! users/{user_id}                                   user profile (read-only to the HTTP surface)
//! PhoneCallSessions/{user_id}                       one call session per user
//! PhoneCallSessions/{user_id}/RequestLog/{auto_id}  append-only call log entries
//! ```
//!
//! The number of `RequestLog` entries under a session is the only quota
//! signal. Entries are never updated or deleted, so the count is a lifetime
//! counter rather than a rolling window.
//!
//! Two backends implement [`CallStore`]:
//! - [`firestore::FirestoreStore`] talks to Cloud Firestore over its REST API
//! - [`memory::MemoryStore`] keeps everything in process, for local
//!   development and tests

pub mod firestore;
pub mod memory;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use firestore::FirestoreStore;
pub use memory::{FailPoint, MemoryStore};

/// Collection holding user profiles.
pub const USERS_COLLECTION: &str = "users";

/// Collection holding one call session document per user.
pub const SESSIONS_COLLECTION: &str = "PhoneCallSessions";

/// Subcollection of a call session holding the call log entries.
pub const REQUEST_LOG_COLLECTION: &str = "RequestLog";

/// Firestore rejects document ids above this size.
const MAX_DOCUMENT_ID_BYTES: usize = 1500;

/// Errors raised by store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The id cannot address a document
    #[error("Invalid document id: {0:?}")]
    InvalidDocumentId(String),

    /// Obtaining credentials for the backend failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The backend could not be reached
    #[error("Request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-success status
    #[error("Store returned {status}: {message}")]
    Backend { status: u16, message: String },

    /// The backend answered with something we could not decode
    #[error("Malformed store response: {0}")]
    Decode(String),

    /// The backend refused the operation (injected by [`MemoryStore`])
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Backend configuration is incomplete or invalid
    #[error("Store configuration error: {0}")]
    Config(String),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Lifecycle status of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Initiated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Initiated => "initiated",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type tag stored on each call log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallLogKind {
    /// A call request was received (admin workflow)
    InitialRequest,
    /// A provider B client secret was issued
    SuccessfulOpenAISession,
    /// Any other tag found in the store
    Other(String),
}

impl CallLogKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::InitialRequest => "initial_request",
            Self::SuccessfulOpenAISession => "successful_openai_session",
            Self::Other(tag) => tag,
        }
    }

    pub fn parse(tag: &str) -> Self {
        match tag {
            "initial_request" => Self::InitialRequest,
            "successful_openai_session" => Self::SuccessfulOpenAISession,
            other => Self::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for CallLogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user document. Attributes are free-form.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: String,
    pub fields: Map<String, Value>,
}

/// Profile written by the `seed-user` admin command.
///
/// The creation time is assigned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub premium_member: bool,
}

/// A call session document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSession {
    pub status: SessionStatus,
    /// Document path of the owning user, e.g. `users/u1`
    pub user_ref: String,
    /// Server-assigned creation time (RFC 3339), when known
    pub started_at: Option<String>,
}

/// A call log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLogEntry {
    pub id: String,
    pub kind: CallLogKind,
    /// Server-assigned time (RFC 3339), when known
    pub time: Option<String>,
}

/// Storage operations needed by the quota gate and the call logger.
///
/// Implementations perform single-document reads and writes only. Nothing
/// here is transactional.
#[async_trait]
pub trait CallStore: Send + Sync {
    /// Fetch a user document, `None` when it does not exist.
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserRecord>>;

    /// Write a user document, replacing any existing one.
    async fn put_user(&self, user_id: &str, profile: &UserProfile) -> StoreResult<()>;

    /// Whether the user's call session document exists.
    async fn session_exists(&self, user_id: &str) -> StoreResult<bool>;

    /// Read at most `limit` call log entries under the user's session.
    async fn list_call_logs(&self, user_id: &str, limit: usize) -> StoreResult<Vec<CallLogEntry>>;

    /// Write the user's call session document with a server timestamp.
    ///
    /// This is an unconditional overwrite, not a merge.
    async fn put_session(&self, user_id: &str, status: SessionStatus) -> StoreResult<()>;

    /// Append a call log entry with a server timestamp, returning its id.
    async fn append_call_log(&self, user_id: &str, kind: &CallLogKind) -> StoreResult<String>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Check that `id` can be used as a single document id.
pub fn validate_document_id(id: &str) -> StoreResult<()> {
    if id.is_empty()
        || id == "."
        || id == ".."
        || id.contains('/')
        || id.len() > MAX_DOCUMENT_ID_BYTES
    {
        return Err(StoreError::InvalidDocumentId(id.to_string()));
    }
    Ok(())
}

/// Document path of a user, relative to the database root.
pub fn user_document_path(user_id: &str) -> String {
    format!("{USERS_COLLECTION}/{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_document_id_accepts_opaque_ids() {
        assert!(validate_document_id("jensen_123").is_ok());
        assert!(validate_document_id("a b:c").is_ok());
    }

    #[test]
    fn test_validate_document_id_rejects_unaddressable_ids() {
        for id in ["", ".", "..", "a/b"] {
            assert!(matches!(
                validate_document_id(id),
                Err(StoreError::InvalidDocumentId(_))
            ));
        }
        let long = "x".repeat(MAX_DOCUMENT_ID_BYTES + 1);
        assert!(validate_document_id(&long).is_err());
    }

    #[test]
    fn test_call_log_kind_tags() {
        assert_eq!(CallLogKind::InitialRequest.as_str(), "initial_request");
        assert_eq!(
            CallLogKind::parse("successful_openai_session"),
            CallLogKind::SuccessfulOpenAISession
        );
        assert_eq!(
            CallLogKind::parse("manual"),
            CallLogKind::Other("manual".to_string())
        );
    }

    #[test]
    fn test_user_document_path() {
        assert_eq!(user_document_path("u1"), "users/u1");
    }
}

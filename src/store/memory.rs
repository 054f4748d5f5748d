//! In-process [`CallStore`] backend.
//!
//! Used when `STORE_BACKEND=memory` and throughout the test suite. Data lives
//! for the lifetime of the process. Individual operations can be made to fail
//! with [`MemoryStore::fail_on`] to exercise error paths.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{
    CallLogEntry, CallLogKind, CallSession, CallStore, SessionStatus, StoreError, StoreResult,
    UserProfile, UserRecord, user_document_path, validate_document_id,
};

/// Operations that can be forced to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    GetUser,
    PutUser,
    SessionExists,
    ListCallLogs,
    PutSession,
    AppendCallLog,
}

#[derive(Debug, Default)]
struct MemoryState {
    users: HashMap<String, Map<String, Value>>,
    sessions: HashMap<String, CallSession>,
    logs: HashMap<String, Vec<CallLogEntry>>,
}

/// In-memory document store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    failures: RwLock<HashSet<FailPoint>>,
    session_writes: AtomicUsize,
}

fn now_rfc3339() -> Option<String> {
    OffsetDateTime::now_utc().format(&Rfc3339).ok()
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with empty user documents for each id.
    pub fn with_users<I, S>(user_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for id in user_ids {
            store.insert_user(id, Map::new());
        }
        store
    }

    /// Insert or replace a user document.
    pub fn insert_user(&self, user_id: impl Into<String>, fields: Map<String, Value>) {
        self.state.write().users.insert(user_id.into(), fields);
    }

    /// Create the user's session document directly, without counting it as a
    /// session write.
    pub fn insert_session(&self, user_id: &str) {
        self.state.write().sessions.insert(
            user_id.to_string(),
            CallSession {
                status: SessionStatus::Initiated,
                user_ref: user_document_path(user_id),
                started_at: now_rfc3339(),
            },
        );
    }

    /// Create the user's session (if needed) and `count` log entries of `kind`.
    pub fn insert_call_logs(&self, user_id: &str, count: usize, kind: CallLogKind) {
        if !self.state.read().sessions.contains_key(user_id) {
            self.insert_session(user_id);
        }
        let mut state = self.state.write();
        let logs = state.logs.entry(user_id.to_string()).or_default();
        for _ in 0..count {
            logs.push(CallLogEntry {
                id: uuid::Uuid::new_v4().simple().to_string(),
                kind: kind.clone(),
                time: now_rfc3339(),
            });
        }
    }

    /// Make `point` fail until [`MemoryStore::clear_failures`] is called.
    pub fn fail_on(&self, point: FailPoint) {
        self.failures.write().insert(point);
    }

    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Number of log entries stored for the user.
    pub fn call_log_count(&self, user_id: &str) -> usize {
        self.state
            .read()
            .logs
            .get(user_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn call_logs(&self, user_id: &str) -> Vec<CallLogEntry> {
        self.state
            .read()
            .logs
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn session(&self, user_id: &str) -> Option<CallSession> {
        self.state.read().sessions.get(user_id).cloned()
    }

    /// Number of `put_session` calls that reached the store.
    pub fn session_writes(&self) -> usize {
        self.session_writes.load(Ordering::SeqCst)
    }

    fn check(&self, point: FailPoint) -> StoreResult<()> {
        if self.failures.read().contains(&point) {
            return Err(StoreError::Unavailable(format!("{point:?} disabled")));
        }
        Ok(())
    }
}

#[async_trait]
impl CallStore for MemoryStore {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserRecord>> {
        self.check(FailPoint::GetUser)?;
        validate_document_id(user_id)?;
        Ok(self.state.read().users.get(user_id).map(|fields| UserRecord {
            id: user_id.to_string(),
            fields: fields.clone(),
        }))
    }

    async fn put_user(&self, user_id: &str, profile: &UserProfile) -> StoreResult<()> {
        self.check(FailPoint::PutUser)?;
        validate_document_id(user_id)?;

        let mut fields = Map::new();
        if let Some(name) = &profile.name {
            fields.insert("name".to_string(), Value::String(name.clone()));
        }
        if let Some(email) = &profile.email {
            fields.insert("email".to_string(), Value::String(email.clone()));
        }
        fields.insert(
            "premiumMember".to_string(),
            Value::Bool(profile.premium_member),
        );
        if let Some(created_at) = now_rfc3339() {
            fields.insert("createdAt".to_string(), Value::String(created_at));
        }
        self.insert_user(user_id, fields);
        Ok(())
    }

    async fn session_exists(&self, user_id: &str) -> StoreResult<bool> {
        self.check(FailPoint::SessionExists)?;
        validate_document_id(user_id)?;
        Ok(self.state.read().sessions.contains_key(user_id))
    }

    async fn list_call_logs(&self, user_id: &str, limit: usize) -> StoreResult<Vec<CallLogEntry>> {
        self.check(FailPoint::ListCallLogs)?;
        validate_document_id(user_id)?;
        Ok(self
            .state
            .read()
            .logs
            .get(user_id)
            .map(|logs| logs.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn put_session(&self, user_id: &str, status: SessionStatus) -> StoreResult<()> {
        self.check(FailPoint::PutSession)?;
        validate_document_id(user_id)?;
        self.session_writes.fetch_add(1, Ordering::SeqCst);
        self.state.write().sessions.insert(
            user_id.to_string(),
            CallSession {
                status,
                user_ref: user_document_path(user_id),
                started_at: now_rfc3339(),
            },
        );
        Ok(())
    }

    async fn append_call_log(&self, user_id: &str, kind: &CallLogKind) -> StoreResult<String> {
        self.check(FailPoint::AppendCallLog)?;
        validate_document_id(user_id)?;
        let id = uuid::Uuid::new_v4().simple().to_string();
        self.state
            .write()
            .logs
            .entry(user_id.to_string())
            .or_default()
            .push(CallLogEntry {
                id: id.clone(),
                kind: kind.clone(),
                time: now_rfc3339(),
            });
        Ok(id)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_user_missing_and_present() {
        let store = MemoryStore::with_users(["u1"]);

        assert!(store.get_user("u1").await.unwrap().is_some());
        assert!(store.get_user("u2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_call_logs_respects_limit() {
        let store = MemoryStore::with_users(["u1"]);
        store.insert_call_logs("u1", 7, CallLogKind::SuccessfulOpenAISession);

        assert_eq!(store.list_call_logs("u1", 5).await.unwrap().len(), 5);
        assert_eq!(store.list_call_logs("u1", 50).await.unwrap().len(), 7);
        assert!(store.list_call_logs("u1", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_put_session_overwrites_and_counts_writes() {
        let store = MemoryStore::with_users(["u1"]);

        store.put_session("u1", SessionStatus::Initiated).await.unwrap();
        store.put_session("u1", SessionStatus::Initiated).await.unwrap();

        assert_eq!(store.session_writes(), 2);
        let session = store.session("u1").unwrap();
        assert_eq!(session.user_ref, "users/u1");
        assert!(session.started_at.is_some());
    }

    #[tokio::test]
    async fn test_put_user_records_profile_fields() {
        let store = MemoryStore::new();
        let profile = UserProfile {
            name: Some("Jensen".to_string()),
            email: Some("jensen@example.com".to_string()),
            premium_member: true,
        };

        store.put_user("jensen_123", &profile).await.unwrap();

        let user = store.get_user("jensen_123").await.unwrap().unwrap();
        assert_eq!(user.fields["name"], "Jensen");
        assert_eq!(user.fields["premiumMember"], true);
        assert!(user.fields.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn test_fail_points() {
        let store = MemoryStore::with_users(["u1"]);
        store.fail_on(FailPoint::AppendCallLog);

        let result = store
            .append_call_log("u1", &CallLogKind::InitialRequest)
            .await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.call_log_count("u1"), 0);

        store.clear_failures();
        assert!(
            store
                .append_call_log("u1", &CallLogKind::InitialRequest)
                .await
                .is_ok()
        );
        assert_eq!(store.call_log_count("u1"), 1);
    }

    #[tokio::test]
    async fn test_rejects_invalid_ids() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get_user("a/b").await,
            Err(StoreError::InvalidDocumentId(_))
        ));
    }
}

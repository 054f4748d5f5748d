//! Best-effort call logging.
//!
//! A failed log write never fails the user-visible response. Errors are
//! logged and reported as `false`.

use tracing::{error, info};

use crate::store::{CallLogKind, CallStore, SessionStatus, StoreResult};

/// Record a successful provider B session for the user.
///
/// Creates the user's session document first if it does not exist. The
/// existence check and the write are separate, and the write overwrites, so
/// a concurrent writer to the same session document can be clobbered.
pub async fn log_success(store: &dyn CallStore, user_id: &str) -> bool {
    match try_log_success(store, user_id).await {
        Ok(entry_id) => {
            info!(user_id = %user_id, entry_id = %entry_id, "Logged successful call");
            true
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to log successful call");
            false
        }
    }
}

async fn try_log_success(store: &dyn CallStore, user_id: &str) -> StoreResult<String> {
    if !store.session_exists(user_id).await? {
        info!(user_id = %user_id, "No call session found, creating one");
        store.put_session(user_id, SessionStatus::Initiated).await?;
    }

    store
        .append_call_log(user_id, &CallLogKind::SuccessfulOpenAISession)
        .await
}

/// Record a new call request for an existing user.
///
/// The session document is (re)written unconditionally and an
/// `initial_request` entry is appended. Returns `false` when the user does not
/// exist or any store operation fails.
pub async fn log_initial_request(store: &dyn CallStore, user_id: &str) -> bool {
    match try_log_initial_request(store, user_id).await {
        Ok(Some(entry_id)) => {
            info!(user_id = %user_id, entry_id = %entry_id, "Logged initial call request");
            true
        }
        Ok(None) => {
            error!(user_id = %user_id, "User not found, call request not logged");
            false
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "Failed to log call request");
            false
        }
    }
}

async fn try_log_initial_request(
    store: &dyn CallStore,
    user_id: &str,
) -> StoreResult<Option<String>> {
    if store.get_user(user_id).await?.is_none() {
        return Ok(None);
    }

    store.put_session(user_id, SessionStatus::Initiated).await?;
    store
        .append_call_log(user_id, &CallLogKind::InitialRequest)
        .await
        .map(Some)
}

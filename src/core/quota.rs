//! Quota gate: user existence check plus lifetime call-count limit.
//!
//! The gate is read-only. It counts at most `limit` call log entries under
//! the user's session, so the read cost is bounded by the limit rather than
//! by the user's history.
//!
//! Checking and logging are separate steps (see [`crate::core::call_log`]).
//! Two concurrent requests for the same user can both pass before either one
//! logs, so the limit can be overrun by up to the number of requests in
//! flight. Exact enforcement needs an atomic increment-and-check in the store.

use axum::http::StatusCode;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{CallStore, StoreError};

/// Reasons the gate denies a request.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// No user document exists for the id
    #[error("User not found")]
    UserNotFound,

    /// The user has already used `limit` calls
    #[error("Rate limit exceeded")]
    LimitExceeded { used: usize, limit: usize },

    /// Reading the user document failed
    #[error("Database error: {0}")]
    UserLookup(#[source] StoreError),

    /// Reading the session or its call log failed
    #[error("Database error while checking logs: {0}")]
    LogLookup(#[source] StoreError),
}

impl QuotaError {
    /// HTTP status reported for this denial.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UserNotFound => StatusCode::UNAUTHORIZED,
            Self::LimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UserLookup(_) | Self::LogLookup(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Quota usage observed by a passing gate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaUsage {
    /// Call log entries counted, capped at `limit`
    pub used: usize,
    pub limit: usize,
}

impl QuotaUsage {
    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.used)
    }
}

/// Allow the request if the user exists and has fewer than `limit` logged calls.
///
/// A user without a session document counts as zero calls. The same
/// `used >= limit` comparison applies either way.
pub async fn check_quota(
    store: &dyn CallStore,
    user_id: &str,
    limit: usize,
) -> Result<QuotaUsage, QuotaError> {
    debug!(user_id = %user_id, limit, "Checking user and quota");

    match store.get_user(user_id).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!(user_id = %user_id, "Quota check failed: user not found");
            return Err(QuotaError::UserNotFound);
        }
        Err(e) => {
            warn!(user_id = %user_id, error = %e, "Quota check failed: user lookup error");
            return Err(QuotaError::UserLookup(e));
        }
    }

    let has_session = store
        .session_exists(user_id)
        .await
        .map_err(QuotaError::LogLookup)?;

    let used = if has_session {
        store
            .list_call_logs(user_id, limit)
            .await
            .map_err(QuotaError::LogLookup)?
            .len()
    } else {
        0
    };

    if used >= limit {
        warn!(user_id = %user_id, used, limit, "Quota check failed: rate limit exceeded");
        return Err(QuotaError::LimitExceeded { used, limit });
    }

    info!(user_id = %user_id, used, limit, "User is authenticated and within quota");
    Ok(QuotaUsage { used, limit })
}

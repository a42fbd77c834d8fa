/// Session Store
///
/// Durable revocation ledger for refresh tokens. One record per issued refresh
/// token; records are only ever marked revoked, never deleted.
///
/// A record is *active* while `is_revoked == false` and `expires_at > now`.
/// Expiry is evaluated at lookup time and is never written back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::ClientContext;
use crate::error::StoreError;

mod memory;
mod postgres;

pub use memory::InMemorySessionStore;
pub use postgres::PostgresSessionStore;

pub const REASON_ROTATED: &str = "rotated";
pub const REASON_LOGOUT: &str = "logout";
pub const REASON_PASSWORD_CHANGED: &str = "password_changed";
pub const REASON_SECURITY_INCIDENT: &str = "security_incident";

/// Persisted refresh token record
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub user_id: String,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RefreshTokenRecord {
    pub fn new(
        user_id: &str,
        token_id: &str,
        expires_at: DateTime<Utc>,
        client: &ClientContext,
    ) -> Self {
        Self {
            user_id: user_id.to_string(),
            token_id: token_id.to_string(),
            expires_at,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            is_revoked: false,
            revoked_at: None,
            revoked_reason: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked && self.expires_at > now
    }

    /// Mark revoked. Returns false if the record was already revoked.
    pub fn revoke(&mut self, reason: &str) -> bool {
        if self.is_revoked {
            return false;
        }
        self.is_revoked = true;
        self.revoked_at = Some(Utc::now());
        self.revoked_reason = Some(reason.to_string());
        true
    }
}

/// Storage backend for refresh token records
///
/// Every mutation touches a single record or a single user's records and must
/// be atomic on its own; a revocation must be visible to the next lookup from
/// any process.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new active record
    async fn create(
        &self,
        user_id: &str,
        token_id: &str,
        expires_at: DateTime<Utc>,
        client: &ClientContext,
    ) -> Result<RefreshTokenRecord, StoreError>;

    /// Active record for `(user_id, token_id)`, if any
    async fn find_active(
        &self,
        user_id: &str,
        token_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Revoke one record
    ///
    /// Returns `true` only when this call moved the record from not-revoked to
    /// revoked. Unknown or already revoked tokens yield `Ok(false)`.
    async fn revoke(&self, token_id: &str, reason: &str) -> Result<bool, StoreError>;

    /// Revoke every active record of a user, returning how many were revoked
    async fn revoke_all(&self, user_id: &str, reason: &str) -> Result<u64, StoreError>;

    /// Active records of a user, newest first
    async fn list_active(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_record_activity_follows_revocation_and_expiry() {
        let mut record = RefreshTokenRecord::new(
            "u1",
            "t1",
            Utc::now() + Duration::hours(1),
            &ClientContext::default(),
        );
        assert!(record.is_active_at(Utc::now()));
        assert!(!record.is_active_at(Utc::now() + Duration::hours(2)));

        assert!(record.revoke(REASON_LOGOUT));
        assert!(!record.is_active_at(Utc::now()));
        assert_eq!(record.revoked_reason.as_deref(), Some(REASON_LOGOUT));
        assert!(record.revoked_at.is_some());
    }

    #[test]
    fn test_second_revoke_keeps_first_reason() {
        let mut record = RefreshTokenRecord::new(
            "u1",
            "t1",
            Utc::now() + Duration::hours(1),
            &ClientContext::default(),
        );

        assert!(record.revoke(REASON_ROTATED));
        assert!(!record.revoke(REASON_LOGOUT));
        assert_eq!(record.revoked_reason.as_deref(), Some(REASON_ROTATED));
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{RefreshTokenRecord, SessionStore};
use crate::auth::ClientContext;
use crate::error::StoreError;

/// Process-local session store
///
/// Records are keyed by token id. All mutations happen under the write lock,
/// so a revoke is observed by every later lookup.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    records: RwLock<HashMap<String, RefreshTokenRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a record regardless of its state
    pub async fn get(&self, token_id: &str) -> Option<RefreshTokenRecord> {
        self.records.read().await.get(token_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        user_id: &str,
        token_id: &str,
        expires_at: DateTime<Utc>,
        client: &ClientContext,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(token_id) {
            return Err(StoreError::Corrupted(format!(
                "duplicate refresh token id {}",
                token_id
            )));
        }

        let record = RefreshTokenRecord::new(user_id, token_id, expires_at, client);
        records.insert(token_id.to_string(), record.clone());
        Ok(record)
    }

    async fn find_active(
        &self,
        user_id: &str,
        token_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let now = Utc::now();
        Ok(self
            .records
            .read()
            .await
            .get(token_id)
            .filter(|record| record.user_id == user_id && record.is_active_at(now))
            .cloned())
    }

    async fn revoke(&self, token_id: &str, reason: &str) -> Result<bool, StoreError> {
        Ok(self
            .records
            .write()
            .await
            .get_mut(token_id)
            .map(|record| record.revoke(reason))
            .unwrap_or(false))
    }

    async fn revoke_all(&self, user_id: &str, reason: &str) -> Result<u64, StoreError> {
        let now = Utc::now();
        let mut revoked = 0;
        for record in self.records.write().await.values_mut() {
            if record.user_id == user_id && record.is_active_at(now) && record.revoke(reason) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let now = Utc::now();
        let mut active: Vec<RefreshTokenRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|record| record.user_id == user_id && record.is_active_at(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }
}

/// Postgres Session Store
///
/// Backs the revocation ledger with the `refresh_tokens` table created by
/// `migrations/`. Each call is a single statement, so every write is atomic
/// and immediately visible to other connections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use super::{RefreshTokenRecord, SessionStore};
use crate::auth::ClientContext;
use crate::configuration::DatabaseSettings;
use crate::error::StoreError;

const RECORD_COLUMNS: &str = "user_id, token_id, expires_at, ip_address, user_agent, \
     is_revoked, revoked_at, revoked_reason, created_at";

#[derive(Debug, Clone)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a lazily connecting pool
    ///
    /// `acquire_timeout` bounds how long a call may wait for a connection.
    pub fn connect(
        settings: &DatabaseSettings,
        acquire_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(&settings.connection_string())?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(
        &self,
        user_id: &str,
        token_id: &str,
        expires_at: DateTime<Utc>,
        client: &ClientContext,
    ) -> Result<RefreshTokenRecord, StoreError> {
        let record = RefreshTokenRecord::new(user_id, token_id, expires_at, client);

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (token_id, user_id, expires_at, ip_address, user_agent, is_revoked, created_at)
            VALUES ($1, $2, $3, $4, $5, false, $6)
            "#,
        )
        .bind(&record.token_id)
        .bind(&record.user_id)
        .bind(record.expires_at)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_active(
        &self,
        user_id: &str,
        token_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM refresh_tokens
            WHERE token_id = $1 AND user_id = $2 AND is_revoked = false AND expires_at > $3
            "#,
            RECORD_COLUMNS
        );

        let record = sqlx::query_as::<_, RefreshTokenRecord>(&query)
            .bind(token_id)
            .bind(user_id)
            .bind(Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn revoke(&self, token_id: &str, reason: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = true, revoked_at = $1, revoked_reason = $2
            WHERE token_id = $3 AND is_revoked = false
            "#,
        )
        .bind(Utc::now())
        .bind(reason)
        .bind(token_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all(&self, user_id: &str, reason: &str) -> Result<u64, StoreError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = true, revoked_at = $1, revoked_reason = $2
            WHERE user_id = $3 AND is_revoked = false AND expires_at > $1
            "#,
        )
        .bind(now)
        .bind(reason)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn list_active(&self, user_id: &str) -> Result<Vec<RefreshTokenRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM refresh_tokens
            WHERE user_id = $1 AND is_revoked = false AND expires_at > $2
            ORDER BY created_at DESC
            "#,
            RECORD_COLUMNS
        );

        let records = sqlx::query_as::<_, RefreshTokenRecord>(&query)
            .bind(user_id)
            .bind(Utc::now())
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}

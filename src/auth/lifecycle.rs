/// Token Lifecycle
///
/// Issues, verifies, rotates and revokes access/refresh token pairs.
///
/// A refresh token is accepted only when its signature and embedded expiry
/// are valid AND the store holds an active record for it. Issuance and
/// rotation are all-or-nothing: a pair is returned only after its refresh
/// record has been persisted.

use chrono::{Duration as ChronoDuration, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::auth::claims::{AccessTokenClaims, ClientContext, RefreshIdentity, TokenPair};
use crate::auth::jwt::TokenSigner;
use crate::configuration::{SessionStoreSettings, TokenSettings};
use crate::error::{AuthError, StoreError};
use crate::session_store::{RefreshTokenRecord, SessionStore, REASON_ROTATED};

pub struct TokenLifecycleManager {
    signer: TokenSigner,
    store: Arc<dyn SessionStore>,
    store_timeout: Duration,
}

impl TokenLifecycleManager {
    pub fn new(signer: TokenSigner, store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        Self {
            signer,
            store,
            store_timeout,
        }
    }

    /// Build a manager from configuration
    ///
    /// # Errors
    /// Fails at startup if the token settings are unusable
    pub fn from_settings(
        tokens: &TokenSettings,
        store_settings: &SessionStoreSettings,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, AuthError> {
        let signer = TokenSigner::new(tokens)?;
        Ok(Self::new(signer, store, store_settings.timeout()))
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// Issue a fresh pair for a newly authenticated user
    ///
    /// Starts a new session. Empty `roles` default to `["user"]`.
    ///
    /// # Errors
    /// `TokenGenerationFailed` wrapping the cause; no tokens escape on failure
    pub async fn generate_tokens(
        &self,
        user_id: &str,
        email: &str,
        roles: &[String],
        client: &ClientContext,
    ) -> Result<TokenPair, AuthError> {
        let session_id = Uuid::new_v4().to_string();

        let (pair, token_id) = self
            .issue_pair(user_id, email, roles, &session_id, client)
            .await
            .map_err(|e| {
                tracing::error!(user_id = %user_id, error = %e, "Token generation failed");
                AuthError::TokenGenerationFailed(Box::new(e))
            })?;

        tracing::info!(
            user_id = %user_id,
            session_id = %session_id,
            token_id = %token_id,
            "Token pair issued"
        );
        Ok(pair)
    }

    /// Stateless access token check; the store is never consulted
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.signer.verify_access_token(token)
    }

    /// Check a refresh token's signature and its store record
    ///
    /// # Errors
    /// - `RefreshTokenInvalid` / `RefreshTokenExpired`: signature or embedded expiry
    /// - `RefreshTokenNotFoundOrRevoked`: no active record, even if the signature is fine
    /// - `StoreUnavailable`: the store could not answer
    pub async fn verify_refresh_token(&self, token: &str) -> Result<RefreshIdentity, AuthError> {
        let claims = self
            .signer
            .verify_refresh_token_signature(token)
            .map_err(|e| {
                let err = match e {
                    AuthError::TokenExpired => AuthError::RefreshTokenExpired,
                    _ => AuthError::RefreshTokenInvalid,
                };
                tracing::warn!(reason = %err, "Refresh token rejected");
                err
            })?;

        let record = self
            .store_call("find_active", self.store.find_active(&claims.user_id, &claims.token_id))
            .await?;

        if record.is_none() {
            tracing::warn!(
                security_event = "refresh_token_inactive",
                user_id = %claims.user_id,
                session_id = %claims.session_id,
                token_id = %claims.token_id,
                "Signed refresh token has no active record"
            );
            return Err(AuthError::RefreshTokenNotFoundOrRevoked);
        }

        Ok(claims.identity())
    }

    /// Exchange a refresh token for a new pair in the same session
    ///
    /// The old record is revoked before the new one is written. If writing the
    /// new record fails the old token stays revoked and the user has to log in
    /// again.
    ///
    /// # Errors
    /// `RotationFailed` wrapping the cause
    pub async fn rotate_refresh_token(
        &self,
        old_token: &str,
        email: &str,
        roles: &[String],
        client: &ClientContext,
    ) -> Result<TokenPair, AuthError> {
        let identity = self.verify_refresh_token(old_token).await.map_err(|e| {
            if matches!(e, AuthError::RefreshTokenNotFoundOrRevoked) {
                tracing::warn!(
                    security_event = "refresh_token_replay",
                    "Rotation attempted with an inactive refresh token"
                );
            }
            AuthError::RotationFailed(Box::new(e))
        })?;

        let revoked = self
            .store_call("revoke", self.store.revoke(&identity.token_id, REASON_ROTATED))
            .await
            .map_err(|e| AuthError::RotationFailed(Box::new(e)))?;

        if !revoked {
            // Another rotation revoked this token between our lookup and our revoke
            tracing::warn!(
                security_event = "refresh_token_replay",
                user_id = %identity.user_id,
                session_id = %identity.session_id,
                token_id = %identity.token_id,
                "Concurrent rotation of the same refresh token"
            );
            return Err(AuthError::RotationFailed(Box::new(
                AuthError::RefreshTokenNotFoundOrRevoked,
            )));
        }

        let (pair, token_id) = self
            .issue_pair(&identity.user_id, email, roles, &identity.session_id, client)
            .await
            .map_err(|e| {
                tracing::error!(
                    user_id = %identity.user_id,
                    session_id = %identity.session_id,
                    revoked_token_id = %identity.token_id,
                    error = %e,
                    "Old refresh token revoked but replacement not persisted; session ends"
                );
                AuthError::RotationFailed(Box::new(e))
            })?;

        tracing::info!(
            user_id = %identity.user_id,
            session_id = %identity.session_id,
            old_token_id = %identity.token_id,
            token_id = %token_id,
            "Refresh token rotated"
        );
        Ok(pair)
    }

    /// Revoke one refresh token; unknown or already revoked ids succeed
    pub async fn revoke_refresh_token(
        &self,
        token_id: &str,
        reason: &str,
    ) -> Result<(), AuthError> {
        let newly_revoked = self
            .store_call("revoke", self.store.revoke(token_id, reason))
            .await?;

        tracing::info!(
            token_id = %token_id,
            reason = %reason,
            newly_revoked = newly_revoked,
            "Refresh token revoked"
        );
        Ok(())
    }

    /// Revoke every active refresh token of a user
    pub async fn revoke_all_user_tokens(
        &self,
        user_id: &str,
        reason: &str,
    ) -> Result<u64, AuthError> {
        let count = self
            .store_call("revoke_all", self.store.revoke_all(user_id, reason))
            .await?;

        tracing::info!(
            user_id = %user_id,
            reason = %reason,
            count = count,
            "All refresh tokens revoked for user"
        );
        Ok(count)
    }

    /// Active refresh token records of a user, newest first
    pub async fn active_sessions(
        &self,
        user_id: &str,
    ) -> Result<Vec<RefreshTokenRecord>, AuthError> {
        self.store_call("list_active", self.store.list_active(user_id)).await
    }

    async fn issue_pair(
        &self,
        user_id: &str,
        email: &str,
        roles: &[String],
        session_id: &str,
        client: &ClientContext,
    ) -> Result<(TokenPair, String), AuthError> {
        let access_token = self
            .signer
            .sign_access_token(user_id, email, roles, session_id)?;

        let token_id = Uuid::new_v4().to_string();
        let refresh_token = self
            .signer
            .sign_refresh_token(user_id, session_id, &token_id)?;

        let expires_at = ChronoDuration::try_seconds(self.signer.refresh_expiry_seconds())
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .ok_or_else(|| {
                AuthError::InvalidConfiguration(
                    "refresh token expiry is out of range".to_string(),
                )
            })?;
        self.store_call(
            "create",
            self.store.create(user_id, &token_id, expires_at, client),
        )
        .await?;

        let pair = TokenPair::bearer(
            access_token,
            refresh_token,
            self.signer.access_expiry_seconds(),
        );
        Ok((pair, token_id))
    }

    /// Run a store call under the configured timeout
    async fn store_call<T, F>(&self, operation: &'static str, call: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let outcome = match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.store_timeout)),
        };

        outcome.map_err(|e| {
            tracing::error!(operation = operation, error = %e, "Session store call failed");
            AuthError::StoreUnavailable(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::RefreshTokenClaims;
    use crate::session_store::InMemorySessionStore;

    fn get_test_settings() -> TokenSettings {
        TokenSettings {
            access_token_secret: "lifecycle-access-secret-0123456789abcdef".to_string(),
            refresh_token_secret: "lifecycle-refresh-secret-0123456789abcdef".to_string(),
            access_token_expiry: "15m".to_string(),
            refresh_token_expiry: "7d".to_string(),
            issuer: "test".to_string(),
            audience: "test-clients".to_string(),
        }
    }

    fn manager(store: Arc<InMemorySessionStore>) -> TokenLifecycleManager {
        TokenLifecycleManager::from_settings(
            &get_test_settings(),
            &SessionStoreSettings::default(),
            store,
        )
        .expect("Failed to build manager")
    }

    #[tokio::test]
    async fn expired_store_record_rejects_validly_signed_token() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = manager(store.clone());

        let token = manager
            .signer()
            .sign_refresh_token("u1", "s1", "t1")
            .unwrap();
        store
            .create(
                "u1",
                "t1",
                Utc::now() - ChronoDuration::seconds(1),
                &ClientContext::default(),
            )
            .await
            .unwrap();

        let result = manager.verify_refresh_token(&token).await;

        assert!(matches!(result, Err(AuthError::RefreshTokenNotFoundOrRevoked)));
    }

    #[tokio::test]
    async fn expired_signature_rejects_token_with_live_record() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = manager(store.clone());

        let mut claims = RefreshTokenClaims::new("u1", "s1", "t1", "test", "test-clients", 60);
        claims.iat -= 3600;
        claims.exp = claims.iat + 60;
        let token = manager.signer().encode_refresh_claims(&claims).unwrap();
        store
            .create(
                "u1",
                "t1",
                Utc::now() + ChronoDuration::days(1),
                &ClientContext::default(),
            )
            .await
            .unwrap();

        let result = manager.verify_refresh_token(&token).await;

        assert!(matches!(result, Err(AuthError::RefreshTokenExpired)));
    }

    #[tokio::test]
    async fn record_belonging_to_another_user_is_not_accepted() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = manager(store.clone());

        let token = manager
            .signer()
            .sign_refresh_token("intruder", "s1", "t1")
            .unwrap();
        store
            .create(
                "victim",
                "t1",
                Utc::now() + ChronoDuration::days(1),
                &ClientContext::default(),
            )
            .await
            .unwrap();

        let result = manager.verify_refresh_token(&token).await;

        assert!(matches!(result, Err(AuthError::RefreshTokenNotFoundOrRevoked)));
    }

    #[tokio::test]
    async fn longest_accepted_expiry_issues_tokens() {
        let mut settings = get_test_settings();
        settings.access_token_expiry = "36500d".to_string();
        settings.refresh_token_expiry = "36500d".to_string();
        let store = Arc::new(InMemorySessionStore::new());
        let signer = TokenSigner::new(&settings).expect("Failed to build signer");
        let manager = TokenLifecycleManager::new(signer, store, Duration::from_secs(1));

        let pair = manager
            .generate_tokens("u1", "u1@x.com", &[], &ClientContext::default())
            .await
            .expect("Failed to generate tokens");

        assert!(manager.verify_refresh_token(&pair.refresh_token).await.is_ok());
        assert_eq!(pair.expires_in, crate::auth::MAX_EXPIRY_SECONDS);
    }

    #[tokio::test]
    async fn refresh_record_expiry_matches_configured_duration() {
        let store = Arc::new(InMemorySessionStore::new());
        let manager = manager(store.clone());

        let pair = manager
            .generate_tokens("u1", "u1@x.com", &[], &ClientContext::default())
            .await
            .unwrap();
        let identity = manager.verify_refresh_token(&pair.refresh_token).await.unwrap();
        let record = store.get(&identity.token_id).await.unwrap();

        let lifetime = record.expires_at - record.created_at;
        assert!((lifetime - ChronoDuration::days(7)).num_seconds().abs() <= 1);
        assert_eq!(pair.expires_in, 900);
        assert_eq!(pair.token_type, "Bearer");
    }
}

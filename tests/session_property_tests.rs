//! Property-based tests for token issuance and rotation

use proptest::prelude::*;
use std::sync::Arc;

use session_tokens::configuration::{SessionStoreSettings, TokenSettings};
use session_tokens::{AuthError, ClientContext, InMemorySessionStore, TokenLifecycleManager};

fn create_test_manager() -> TokenLifecycleManager {
    let settings = TokenSettings {
        access_token_secret: "property-access-secret-0123456789abcdef".to_string(),
        refresh_token_secret: "property-refresh-secret-0123456789abcdef".to_string(),
        access_token_expiry: "5m".to_string(),
        refresh_token_expiry: "1d".to_string(),
        issuer: "session-tokens-test".to_string(),
        audience: "session-tokens-test-clients".to_string(),
    };
    TokenLifecycleManager::from_settings(
        &settings,
        &SessionStoreSettings::default(),
        Arc::new(InMemorySessionStore::new()),
    )
    .unwrap()
}

fn arb_user_id() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,32}"
}

fn arb_email() -> impl Strategy<Value = String> {
    "[a-z0-9]{1,16}@[a-z]{1,12}\\.[a-z]{2,4}"
}

fn arb_roles() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{1,12}", 0..4)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Access and refresh token of one pair always carry the same session
    #[test]
    fn prop_pair_shares_session_id(
        user_id in arb_user_id(),
        email in arb_email(),
        roles in arb_roles(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let manager = create_test_manager();
            let pair = manager
                .generate_tokens(&user_id, &email, &roles, &ClientContext::default())
                .await
                .unwrap();

            let access = manager.verify_access_token(&pair.access_token).unwrap();
            let refresh = manager.verify_refresh_token(&pair.refresh_token).await.unwrap();

            prop_assert_eq!(&access.session_id, &refresh.session_id);
            prop_assert_eq!(&access.user_id, &user_id);
            prop_assert_eq!(&access.email, &email);
            if roles.is_empty() {
                prop_assert_eq!(&access.roles, &vec!["user".to_string()]);
            } else {
                prop_assert_eq!(&access.roles, &roles);
            }
            Ok(())
        })?;
    }

    /// Every rotation keeps the session, mints a new token id and retires the previous token
    #[test]
    fn prop_rotation_chain_keeps_session(
        user_id in arb_user_id(),
        rotations in 1usize..5,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let manager = create_test_manager();
            let client = ClientContext::default();
            let mut current = manager
                .generate_tokens(&user_id, "user@example.com", &[], &client)
                .await
                .unwrap();
            let origin = manager.verify_refresh_token(&current.refresh_token).await.unwrap();
            let mut seen = vec![origin.token_id.clone()];

            for _ in 0..rotations {
                let previous = current.refresh_token.clone();
                current = manager
                    .rotate_refresh_token(&previous, "user@example.com", &[], &client)
                    .await
                    .unwrap();
                let identity = manager.verify_refresh_token(&current.refresh_token).await.unwrap();

                prop_assert_eq!(&identity.session_id, &origin.session_id);
                prop_assert!(!seen.contains(&identity.token_id));
                seen.push(identity.token_id);

                let stale = manager.verify_refresh_token(&previous).await;
                prop_assert!(matches!(stale, Err(AuthError::RefreshTokenNotFoundOrRevoked)));
            }
            Ok(())
        })?;
    }
}

/// Token Claims and Value Types
///
/// Wire payloads for the access and refresh tokens plus the small value types
/// handed back to callers of the token lifecycle.

use serde::{Deserialize, Serialize};

/// Role assigned when the caller supplies none
pub const DEFAULT_ROLE: &str = "user";

/// Claims carried by an access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenClaims {
    pub user_id: String,
    pub email: String,
    /// Ordered, never empty
    pub roles: Vec<String>,
    pub session_id: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl AccessTokenClaims {
    /// Create new claims valid for `expiry_seconds` from now
    pub fn new(
        user_id: &str,
        email: &str,
        roles: &[String],
        session_id: &str,
        issuer: &str,
        audience: &str,
        expiry_seconds: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            user_id: user_id.to_string(),
            email: email.to_string(),
            roles: normalize_roles(roles),
            session_id: session_id.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            iat: now,
            exp: now.saturating_add(expiry_seconds),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Claims carried by a refresh token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenClaims {
    pub user_id: String,
    pub session_id: String,
    /// Random identifier of the persisted record, not the token string
    pub token_id: String,
    pub iss: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

impl RefreshTokenClaims {
    pub fn new(
        user_id: &str,
        session_id: &str,
        token_id: &str,
        issuer: &str,
        audience: &str,
        expiry_seconds: i64,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            token_id: token_id.to_string(),
            iss: issuer.to_string(),
            aud: audience.to_string(),
            iat: now,
            exp: now.saturating_add(expiry_seconds),
        }
    }

    pub fn identity(&self) -> RefreshIdentity {
        RefreshIdentity {
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            token_id: self.token_id.clone(),
        }
    }
}

/// Identity decoded from a refresh token that passed both signature and store checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshIdentity {
    pub user_id: String,
    pub session_id: String,
    pub token_id: String,
}

/// Access and refresh token issued together
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

impl TokenPair {
    pub fn bearer(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Request metadata recorded alongside a refresh token
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientContext {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientContext {
    pub fn new(ip_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            ip_address,
            user_agent,
        }
    }
}

/// Empty role lists fall back to `DEFAULT_ROLE`
pub fn normalize_roles(roles: &[String]) -> Vec<String> {
    if roles.is_empty() {
        vec![DEFAULT_ROLE.to_string()]
    } else {
        roles.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_claims_creation() {
        let roles = vec!["user".to_string(), "editor".to_string()];
        let claims = AccessTokenClaims::new("u1", "u1@x.com", &roles, "s1", "test", "app", 3600);

        assert_eq!(claims.user_id, "u1");
        assert_eq!(claims.email, "u1@x.com");
        assert_eq!(claims.roles, roles);
        assert_eq!(claims.exp - claims.iat, 3600);
        assert!(claims.has_role("editor"));
        assert!(!claims.has_role("admin"));
    }

    #[test]
    fn test_empty_roles_default_to_user() {
        let claims = AccessTokenClaims::new("u1", "u1@x.com", &[], "s1", "test", "app", 60);
        assert_eq!(claims.roles, vec![DEFAULT_ROLE.to_string()]);
    }

    #[test]
    fn test_wire_names_are_camel_case() {
        let claims = RefreshTokenClaims::new("u1", "s1", "t1", "test", "app", 60);
        let json = serde_json::to_value(&claims).unwrap();

        assert_eq!(json["userId"], "u1");
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["tokenId"], "t1");
        assert_eq!(json["iss"], "test");
        assert_eq!(json["aud"], "app");
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_refresh_identity_extraction() {
        let claims = RefreshTokenClaims::new("u1", "s1", "t1", "test", "app", 60);
        let identity = claims.identity();

        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.session_id, "s1");
        assert_eq!(identity.token_id, "t1");
    }

    #[test]
    fn test_negative_expiry_lands_before_issue_time() {
        let claims = AccessTokenClaims::new("u1", "u1@x.com", &[], "s1", "test", "app", -10);
        assert_eq!(claims.exp, claims.iat - 10);
    }
}

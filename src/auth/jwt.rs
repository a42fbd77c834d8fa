/// JWT Signing and Verification
///
/// Stateless HS256 signing of access and refresh tokens. Access and refresh
/// tokens use separate secrets so one can never be replayed as the other.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::auth::claims::{AccessTokenClaims, RefreshTokenClaims};
use crate::configuration::TokenSettings;
use crate::error::AuthError;

/// Longest accepted expiry, 100 years
pub const MAX_EXPIRY_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Parse a duration of the form `<integer><unit>` into seconds
///
/// Units: `s`, `m`, `h`, `d`. Anything else (whitespace, signs, fractions,
/// missing unit) is rejected with `InvalidExpiryFormat`, as is anything
/// longer than `MAX_EXPIRY_SECONDS`.
pub fn parse_duration(spec: &str) -> Result<i64, AuthError> {
    let invalid = || AuthError::InvalidExpiryFormat(spec.to_string());

    let unit = spec.chars().last().ok_or_else(invalid)?;
    let digits = &spec[..spec.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let multiplier: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 60 * 60,
        'd' => 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    digits
        .parse::<i64>()
        .ok()
        .and_then(|value| value.checked_mul(multiplier))
        .filter(|seconds| *seconds <= MAX_EXPIRY_SECONDS)
        .ok_or_else(invalid)
}

/// Signs and verifies access and refresh tokens
#[derive(Clone)]
pub struct TokenSigner {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_expiry_seconds: i64,
    refresh_expiry_seconds: i64,
    issuer: String,
    audience: String,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("access_expiry_seconds", &self.access_expiry_seconds)
            .field("refresh_expiry_seconds", &self.refresh_expiry_seconds)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Build a signer from token settings
    ///
    /// # Errors
    /// `InvalidExpiryFormat` if either expiry is malformed,
    /// `InvalidConfiguration` if a secret, issuer or audience is empty
    pub fn new(settings: &TokenSettings) -> Result<Self, AuthError> {
        let access_expiry_seconds = parse_duration(&settings.access_token_expiry)?;
        let refresh_expiry_seconds = parse_duration(&settings.refresh_token_expiry)?;

        for (name, value) in [
            ("access_token_secret", &settings.access_token_secret),
            ("refresh_token_secret", &settings.refresh_token_secret),
            ("issuer", &settings.issuer),
            ("audience", &settings.audience),
        ] {
            if value.is_empty() {
                return Err(AuthError::InvalidConfiguration(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        let access_secret = settings.access_token_secret.as_bytes();
        let refresh_secret = settings.refresh_token_secret.as_bytes();

        Ok(Self {
            access_encoding: EncodingKey::from_secret(access_secret),
            access_decoding: DecodingKey::from_secret(access_secret),
            refresh_encoding: EncodingKey::from_secret(refresh_secret),
            refresh_decoding: DecodingKey::from_secret(refresh_secret),
            access_expiry_seconds,
            refresh_expiry_seconds,
            issuer: settings.issuer.clone(),
            audience: settings.audience.clone(),
        })
    }

    pub fn access_expiry_seconds(&self) -> i64 {
        self.access_expiry_seconds
    }

    pub fn refresh_expiry_seconds(&self) -> i64 {
        self.refresh_expiry_seconds
    }

    /// Sign an access token for the given identity
    ///
    /// Empty `roles` are replaced with the default role.
    pub fn sign_access_token(
        &self,
        user_id: &str,
        email: &str,
        roles: &[String],
        session_id: &str,
    ) -> Result<String, AuthError> {
        let claims = AccessTokenClaims::new(
            user_id,
            email,
            roles,
            session_id,
            &self.issuer,
            &self.audience,
            self.access_expiry_seconds,
        );
        self.encode_access_claims(&claims)
    }

    /// Sign a refresh token with the refresh secret
    pub fn sign_refresh_token(
        &self,
        user_id: &str,
        session_id: &str,
        token_id: &str,
    ) -> Result<String, AuthError> {
        let claims = RefreshTokenClaims::new(
            user_id,
            session_id,
            token_id,
            &self.issuer,
            &self.audience,
            self.refresh_expiry_seconds,
        );
        self.encode_refresh_claims(&claims)
    }

    /// Decode and check an access token
    ///
    /// # Errors
    /// `TokenExpired` for a genuine but stale token, `TokenInvalid` for anything else
    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.verify(token, &self.access_decoding)
    }

    /// Decode and check a refresh token's signature and embedded expiry only
    ///
    /// The store check happens in the lifecycle manager.
    pub fn verify_refresh_token_signature(
        &self,
        token: &str,
    ) -> Result<RefreshTokenClaims, AuthError> {
        self.verify(token, &self.refresh_decoding)
    }

    pub(crate) fn encode_access_claims(
        &self,
        claims: &AccessTokenClaims,
    ) -> Result<String, AuthError> {
        sign(claims, &self.access_encoding)
    }

    pub(crate) fn encode_refresh_claims(
        &self,
        claims: &RefreshTokenClaims,
    ) -> Result<String, AuthError> {
        sign(claims, &self.refresh_encoding)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iat", "iss", "aud"]);
        validation
    }

    fn verify<T: DeserializeOwned>(&self, token: &str, key: &DecodingKey) -> Result<T, AuthError> {
        decode::<T>(token, key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => {
                    tracing::debug!(error = %e, "JWT validation error");
                    AuthError::TokenInvalid
                }
            })
    }
}

fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| AuthError::InvalidConfiguration(format!("token signing failed: {}", e)))
}

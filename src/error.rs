/// Error Handling Module
///
/// Two layers of errors live here:
/// 1. `StoreError` - failures raised by a session store backend
/// 2. `AuthError` - the closed taxonomy returned by the token lifecycle
///
/// Causes are kept intact for logging, while the HTTP mapping collapses every
/// credential rejection into one indistinguishable 401 response.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// 1. SESSION STORE ERRORS
// ============================================================================

/// Errors raised by a `SessionStore` backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),
    #[error("session store did not answer within {0:?}")]
    Timeout(Duration),
    #[error("session store returned malformed data: {0}")]
    Corrupted(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => {
                StoreError::Unavailable("connection pool timed out".to_string())
            }
            sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::Decode(_) => StoreError::Corrupted(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

// ============================================================================
// 2. TOKEN LIFECYCLE ERRORS
// ============================================================================

/// Errors returned by `TokenSigner` and `TokenLifecycleManager`
#[derive(Debug, Error)]
pub enum AuthError {
    /// Expiry duration string is not `<integer><s|m|h|d>`
    #[error("invalid expiry format: {0:?}")]
    InvalidExpiryFormat(String),
    #[error("invalid token configuration: {0}")]
    InvalidConfiguration(String),
    #[error("invalid token")]
    TokenInvalid,
    #[error("token has expired")]
    TokenExpired,
    #[error("invalid refresh token")]
    RefreshTokenInvalid,
    #[error("refresh token has expired")]
    RefreshTokenExpired,
    /// The signature checked out but the store has no active record for it
    #[error("refresh token not found or revoked")]
    RefreshTokenNotFoundOrRevoked,
    #[error("session store failure: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error("token generation failed")]
    TokenGenerationFailed(#[source] Box<AuthError>),
    #[error("token rotation failed")]
    RotationFailed(#[source] Box<AuthError>),
}

impl AuthError {
    /// Innermost error, unwrapping generation and rotation failures
    pub fn root_cause(&self) -> &AuthError {
        match self {
            AuthError::TokenGenerationFailed(cause) | AuthError::RotationFailed(cause) => {
                cause.root_cause()
            }
            other => other,
        }
    }

    /// True when the caller presented a credential that must be rejected
    pub fn is_credential_rejection(&self) -> bool {
        matches!(
            self.root_cause(),
            AuthError::TokenInvalid
                | AuthError::TokenExpired
                | AuthError::RefreshTokenInvalid
                | AuthError::RefreshTokenExpired
                | AuthError::RefreshTokenNotFoundOrRevoked
        )
    }

    /// True when the failure came from the session store rather than the credential
    pub fn is_store_failure(&self) -> bool {
        matches!(self.root_cause(), AuthError::StoreUnavailable(_))
    }

    /// Stable machine-readable code exposed to HTTP clients
    pub fn code(&self) -> &'static str {
        if self.is_credential_rejection() {
            return "TOKEN_INVALID";
        }
        match self.root_cause() {
            AuthError::StoreUnavailable(_) => "SERVICE_UNAVAILABLE",
            AuthError::InvalidExpiryFormat(_) | AuthError::InvalidConfiguration(_) => {
                "CONFIG_ERROR"
            }
            _ => "INTERNAL_ERROR",
        }
    }

    fn public_message(&self) -> &'static str {
        if self.is_credential_rejection() {
            return "Invalid or expired token";
        }
        match self.root_cause() {
            AuthError::StoreUnavailable(_) => "Session service temporarily unavailable",
            AuthError::InvalidExpiryFormat(_) | AuthError::InvalidConfiguration(_) => {
                "Server configuration error"
            }
            _ => "Internal server error",
        }
    }

    fn log_error(&self, request_id: &str) {
        if self.is_credential_rejection() {
            tracing::warn!(
                request_id = request_id,
                error = %self,
                cause = %self.root_cause(),
                "Credential rejected"
            );
        } else {
            tracing::error!(
                request_id = request_id,
                error = %self,
                cause = %self.root_cause(),
                "Token lifecycle failure"
            );
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error response structure for HTTP responses
#[derive(Debug, serde::Serialize)]
pub struct ErrorResponse {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Human-readable error message
    pub message: String,
    /// Error code for client-side handling
    pub code: String,
    /// HTTP status code
    pub status: u16,
    /// Timestamp when error occurred
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Build the response body for a lifecycle error
    pub fn from_auth_error(error: &AuthError, request_id: &str) -> Self {
        Self::new(
            request_id.to_string(),
            error.public_message().to_string(),
            error.code().to_string(),
            error.status_code().as_u16(),
        )
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        if self.is_credential_rejection() {
            StatusCode::UNAUTHORIZED
        } else if self.is_store_failure() {
            StatusCode::SERVICE_UNAVAILABLE
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    fn error_response(&self) -> HttpResponse {
        let request_id = uuid::Uuid::new_v4().to_string();
        self.log_error(&request_id);

        let body = ErrorResponse::from_auth_error(self, &request_id);
        HttpResponse::build(self.status_code()).json(body)
    }
}

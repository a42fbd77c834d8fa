/// Authentication module
///
/// Handles access/refresh token signing and verification and the lifecycle
/// that ties signed refresh tokens to their revocable store records.

mod claims;
mod jwt;
mod lifecycle;

pub use claims::{
    normalize_roles, AccessTokenClaims, ClientContext, RefreshIdentity, RefreshTokenClaims,
    TokenPair, DEFAULT_ROLE,
};
pub use jwt::{parse_duration, TokenSigner, MAX_EXPIRY_SECONDS};
pub use lifecycle::TokenLifecycleManager;

//! Session token lifecycle: signed access/refresh token pairs backed by a
//! revocable refresh token store.

pub mod auth;
pub mod configuration;
pub mod error;
pub mod session_store;
pub mod telemetry;

pub use auth::{
    AccessTokenClaims, ClientContext, RefreshIdentity, TokenLifecycleManager, TokenPair,
    TokenSigner,
};
pub use error::{AuthError, StoreError};
pub use session_store::{
    InMemorySessionStore, PostgresSessionStore, RefreshTokenRecord, SessionStore,
};

//! Bearer token authentication.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → token.rs (scheme check, local expiry pre-check)
//!     → cache.rs (recently verified tokens)
//!     → verifier.rs (identity provider, on cache miss)
//!     → store.rs (identity lookup, active check)
//!     → middleware.rs (attach identity, forward)
//! ```
//!
//! The local expiry pre-check only short-circuits stale tokens. The verifier is
//! the authority on whether a token is valid.

pub mod authenticator;
pub mod cache;
pub mod error;
pub mod middleware;
pub mod store;
pub mod token;
pub mod verifier;

use serde::{Deserialize, Serialize};

pub use authenticator::TokenAuthenticator;
pub use cache::TokenCache;
pub use error::AuthError;
pub use middleware::require_auth_middleware;
pub use store::{HttpIdentityStore, IdentityStore, InMemoryIdentityStore, StoreError};
pub use verifier::{HttpTokenVerifier, JwtVerifier, TokenVerifier, VerificationError, VerifiedToken};

/// Account record owned by the identity service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    pub email: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

fn active_by_default() -> bool {
    true
}

/// Request extension carrying the identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser(pub UserIdentity);

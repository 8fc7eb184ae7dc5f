//! Authentication failure reasons.

use thiserror::Error;

use crate::auth::store::StoreError;
use crate::auth::verifier::VerificationError;
use crate::error::GuardError;

/// Why a bearer token was refused.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("no token provided")]
    MissingToken,

    #[error("invalid token format")]
    InvalidFormat,

    #[error("token expired")]
    Expired,

    #[error("invalid token signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("authentication failed")]
    Failed,

    #[error("user not found")]
    UserNotFound,

    #[error("account inactive")]
    Inactive,

    /// Identity provider or user service could not be reached.
    #[error("identity service unavailable")]
    Unavailable(String),
}

impl AuthError {
    /// Metric label for the failure.
    pub fn reason_label(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::InvalidFormat => "invalid_format",
            AuthError::Expired => "expired",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Malformed => "malformed",
            AuthError::Failed => "failed",
            AuthError::UserNotFound => "user_not_found",
            AuthError::Inactive => "inactive",
            AuthError::Unavailable(_) => "unavailable",
        }
    }
}

impl From<VerificationError> for AuthError {
    fn from(err: VerificationError) -> Self {
        match err {
            VerificationError::Expired => AuthError::Expired,
            VerificationError::InvalidSignature => AuthError::InvalidSignature,
            VerificationError::Malformed => AuthError::Malformed,
            VerificationError::Other(_) => AuthError::Failed,
            VerificationError::Transport(detail) => AuthError::Unavailable(detail),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Unavailable(err.to_string())
    }
}

impl From<AuthError> for GuardError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unavailable(_) => GuardError::Upstream(err.to_string()),
            other => GuardError::Authentication(other.to_string()),
        }
    }
}

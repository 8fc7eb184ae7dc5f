//! Token verification against the identity provider.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VerifiedToken {
    #[serde(alias = "sub")]
    pub subject: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Failure classes reported by a verifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("token expired")]
    Expired,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed token")]
    Malformed,

    #[error("verification failed: {0}")]
    Other(String),

    /// The provider could not be reached or answered with a server error.
    #[error("identity provider unavailable: {0}")]
    Transport(String),
}

/// Authoritative token check.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerificationError>;
}

#[derive(Debug, Deserialize)]
struct JwtClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// Verifies HS256 tokens with a shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, audience: Option<&str>, leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerificationError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => VerificationError::Expired,
            ErrorKind::InvalidSignature => VerificationError::InvalidSignature,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                VerificationError::Malformed
            }
            _ => VerificationError::Other(e.to_string()),
        })?;

        Ok(VerifiedToken {
            subject: data.claims.sub,
            email: data.claims.email,
        })
    }
}

/// Delegates verification to a remote endpoint.
///
/// Sends `GET {url}` with the caller's bearer token. A 2xx answer carries
/// `{"subject" | "sub", "email"}`; 401/403 bodies are classified by their text;
/// 5xx and network errors are transport failures.
#[derive(Debug, Clone)]
pub struct HttpTokenVerifier {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTokenVerifier {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }
}

#[async_trait]
impl TokenVerifier for HttpTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerificationError> {
        let mut request = self.client.get(&self.url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| VerificationError::Transport(e.to_string()))?;
        let status = response.status();

        if status.is_success() {
            return response
                .json::<VerifiedToken>()
                .await
                .map_err(|e| VerificationError::Transport(format!("invalid verifier response: {e}")));
        }
        if status.is_server_error() {
            return Err(VerificationError::Transport(format!("verifier returned {status}")));
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_rejection(status, &body))
    }
}

fn classify_rejection(status: StatusCode, body: &str) -> VerificationError {
    let text = body.to_ascii_lowercase();
    if text.contains("expired") {
        VerificationError::Expired
    } else if text.contains("signature") {
        VerificationError::InvalidSignature
    } else if text.contains("malformed") {
        VerificationError::Malformed
    } else {
        VerificationError::Other(format!("verifier returned {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde::Serialize;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        email: &'a str,
        exp: u64,
    }

    fn now_secs() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs()
    }

    fn sign(secret: &str, exp: u64) -> String {
        let claims = Claims {
            sub: "user-1",
            email: "user@example.com",
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[tokio::test]
    async fn test_jwt_valid() {
        let verifier = JwtVerifier::new("secret", None, 0);
        let verified = verifier.verify(&sign("secret", now_secs() + 600)).await.unwrap();
        assert_eq!(verified.subject, "user-1");
        assert_eq!(verified.email.as_deref(), Some("user@example.com"));
    }

    #[tokio::test]
    async fn test_jwt_wrong_secret() {
        let verifier = JwtVerifier::new("secret", None, 0);
        let err = verifier.verify(&sign("other", now_secs() + 600)).await.unwrap_err();
        assert_eq!(err, VerificationError::InvalidSignature);
    }

    #[tokio::test]
    async fn test_jwt_expired() {
        let verifier = JwtVerifier::new("secret", None, 0);
        let err = verifier.verify(&sign("secret", now_secs() - 600)).await.unwrap_err();
        assert_eq!(err, VerificationError::Expired);
    }

    #[tokio::test]
    async fn test_jwt_garbage() {
        let verifier = JwtVerifier::new("secret", None, 0);
        let err = verifier.verify("not-a-token").await.unwrap_err();
        assert_eq!(err, VerificationError::Malformed);
    }

    #[test]
    fn test_classify_rejection() {
        assert_eq!(
            classify_rejection(StatusCode::UNAUTHORIZED, "Token Expired"),
            VerificationError::Expired
        );
        assert_eq!(
            classify_rejection(StatusCode::UNAUTHORIZED, "bad signature"),
            VerificationError::InvalidSignature
        );
        assert!(matches!(
            classify_rejection(StatusCode::FORBIDDEN, "nope"),
            VerificationError::Other(_)
        ));
    }
}

//! Token to identity resolution.

use std::sync::Arc;

use crate::auth::cache::TokenCache;
use crate::auth::error::AuthError;
use crate::auth::store::IdentityStore;
use crate::auth::token::{extract_bearer, precheck};
use crate::auth::verifier::TokenVerifier;
use crate::auth::UserIdentity;
use crate::clock::Clock;
use crate::observability::metrics;

/// Resolves an `Authorization` header to an active account.
///
/// Stages, each a possible terminal failure: header present, `Bearer` scheme,
/// payload readable and not past `exp`, cache or verifier accepts the token,
/// identity exists, identity active. Only the verifier and identity store
/// calls suspend; cache reads and writes happen between them.
pub struct TokenAuthenticator {
    verifier: Arc<dyn TokenVerifier>,
    store: Arc<dyn IdentityStore>,
    cache: Arc<TokenCache>,
    clock: Arc<dyn Clock>,
}

impl TokenAuthenticator {
    pub fn new(
        verifier: Arc<dyn TokenVerifier>,
        store: Arc<dyn IdentityStore>,
        cache: Arc<TokenCache>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            verifier,
            store,
            cache,
            clock,
        }
    }

    pub fn cache(&self) -> &Arc<TokenCache> {
        &self.cache
    }

    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<UserIdentity, AuthError> {
        let result = self.resolve(authorization).await;
        if let Err(e) = &result {
            tracing::debug!(reason = e.reason_label(), error = %e, "Authentication failed");
            metrics::record_auth_failure(e.reason_label());
        }
        result
    }

    async fn resolve(&self, authorization: Option<&str>) -> Result<UserIdentity, AuthError> {
        let token = extract_bearer(authorization)?;
        precheck(token, self.clock.now_millis())?;

        if let Some(identity) = self.cache.get(token) {
            metrics::record_token_cache(true);
            return Ok(identity);
        }
        metrics::record_token_cache(false);

        let verified = self.verifier.verify(token).await?;
        let identity = self
            .store
            .lookup(&verified.subject)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if !identity.is_active {
            return Err(AuthError::Inactive);
        }

        self.cache.insert(token, identity.clone());
        tracing::debug!(user_id = %identity.id, "Token verified");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::InMemoryIdentityStore;
    use crate::auth::verifier::{VerificationError, VerifiedToken};
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const NOW: u64 = 1_700_000_000;

    #[derive(Default)]
    struct CountingVerifier {
        calls: AtomicUsize,
        fail: Option<VerificationError>,
    }

    #[async_trait]
    impl TokenVerifier for CountingVerifier {
        async fn verify(&self, token: &str) -> Result<VerifiedToken, VerificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = &self.fail {
                return Err(err.clone());
            }
            let claims = crate::auth::token::decode_claims(token).map_err(|_| VerificationError::Malformed)?;
            Ok(VerifiedToken {
                subject: claims.sub.unwrap_or_default(),
                email: claims.email,
            })
        }
    }

    struct Fixture {
        auth: TokenAuthenticator,
        verifier: Arc<CountingVerifier>,
        store: Arc<InMemoryIdentityStore>,
        clock: ManualClock,
    }

    fn fixture(fail: Option<VerificationError>) -> Fixture {
        let clock = ManualClock::at_epoch_secs(NOW);
        let verifier = Arc::new(CountingVerifier {
            calls: AtomicUsize::new(0),
            fail,
        });
        let store = Arc::new(InMemoryIdentityStore::with_users([
            UserIdentity {
                id: "u1".into(),
                email: "u1@example.com".into(),
                is_active: true,
            },
            UserIdentity {
                id: "dormant".into(),
                email: "dormant@example.com".into(),
                is_active: false,
            },
        ]));
        let cache = Arc::new(TokenCache::new(Duration::from_secs(300), Arc::new(clock.clone())));
        let auth = TokenAuthenticator::new(verifier.clone(), store.clone(), cache, Arc::new(clock.clone()));
        Fixture {
            auth,
            verifier,
            store,
            clock,
        }
    }

    fn bearer(sub: &str, exp: u64) -> String {
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"{sub}","exp":{exp}}}"#));
        format!("Bearer hdr.{payload}.sig")
    }

    fn calls(f: &Fixture) -> usize {
        f.verifier.calls.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_missing_and_malformed_headers() {
        let f = fixture(None);
        assert_eq!(f.auth.authenticate(None).await, Err(AuthError::MissingToken));
        assert_eq!(f.auth.authenticate(Some("Token abc")).await, Err(AuthError::InvalidFormat));
        assert_eq!(calls(&f), 0);
    }

    #[tokio::test]
    async fn test_expired_token_skips_verifier() {
        let f = fixture(None);
        let header = bearer("u1", NOW - 1);
        assert_eq!(f.auth.authenticate(Some(&header)).await, Err(AuthError::Expired));
        assert_eq!(calls(&f), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_then_reverify_after_ttl() {
        let f = fixture(None);
        let header = bearer("u1", NOW + 3600);

        let first = f.auth.authenticate(Some(&header)).await.unwrap();
        assert_eq!(first.id, "u1");

        f.clock.advance(Duration::from_secs(299));
        assert_eq!(f.auth.authenticate(Some(&header)).await.unwrap(), first);
        assert_eq!(calls(&f), 1);

        f.clock.advance(Duration::from_secs(1));
        f.auth.authenticate(Some(&header)).await.unwrap();
        assert_eq!(calls(&f), 2);
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_accounts() {
        let f = fixture(None);
        let unknown = bearer("ghost", NOW + 60);
        assert_eq!(f.auth.authenticate(Some(&unknown)).await, Err(AuthError::UserNotFound));

        let dormant = bearer("dormant", NOW + 60);
        assert_eq!(f.auth.authenticate(Some(&dormant)).await, Err(AuthError::Inactive));
        assert!(f.auth.cache().is_empty());
    }

    #[tokio::test]
    async fn test_revoked_subject_is_reverified() {
        let f = fixture(None);
        let header = bearer("u1", NOW + 3600);
        f.auth.authenticate(Some(&header)).await.unwrap();

        f.store.set_active("u1", false);
        assert!(f.auth.authenticate(Some(&header)).await.is_ok());

        f.auth.cache().invalidate_subject("u1");
        assert_eq!(f.auth.authenticate(Some(&header)).await, Err(AuthError::Inactive));
    }

    #[tokio::test]
    async fn test_verifier_failures() {
        let f = fixture(Some(VerificationError::InvalidSignature));
        let header = bearer("u1", NOW + 60);
        assert_eq!(f.auth.authenticate(Some(&header)).await, Err(AuthError::InvalidSignature));

        let f = fixture(Some(VerificationError::Transport("refused".into())));
        assert!(matches!(
            f.auth.authenticate(Some(&header)).await,
            Err(AuthError::Unavailable(_))
        ));
    }
}

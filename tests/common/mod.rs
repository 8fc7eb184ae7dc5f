//! Shared utilities for gateway integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{HeaderMap, Method, Request, Uri},
    response::Response,
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use request_guard::auth::token::decode_claims;
use request_guard::auth::{InMemoryIdentityStore, TokenVerifier, UserIdentity, VerificationError, VerifiedToken};
use request_guard::clock::ManualClock;
use request_guard::config::GuardConfig;
use request_guard::http::{AppState, GuardDeps, GuardServer};
use request_guard::observability::audit::{SecurityEvent, TracingAuditSink};

/// Epoch seconds every test clock starts at.
pub const START: u64 = 1_700_000_000;

/// Verifier that trusts the token payload and counts calls.
#[derive(Default)]
pub struct StubVerifier {
    calls: AtomicUsize,
    failure: Mutex<Option<VerificationError>>,
}

impl StubVerifier {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, err: VerificationError) {
        *self.failure.lock().unwrap() = Some(err);
    }
}

#[async_trait]
impl TokenVerifier for StubVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedToken, VerificationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failure.lock().unwrap().clone() {
            return Err(err);
        }
        let claims = decode_claims(token).map_err(|_| VerificationError::Malformed)?;
        Ok(VerifiedToken {
            subject: claims.sub.ok_or(VerificationError::Malformed)?,
            email: claims.email,
        })
    }
}

pub struct TestGuard {
    pub router: Router,
    pub state: AppState,
    pub clock: ManualClock,
    pub verifier: Arc<StubVerifier>,
    pub store: Arc<InMemoryIdentityStore>,
}

impl TestGuard {
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, ip: &str) -> Response {
        self.send(request(Method::GET, uri, ip, None, Body::empty())).await
    }

    pub async fn post_json(&self, uri: &str, ip: &str, body: &str) -> Response {
        self.send(request(Method::POST, uri, ip, Some("application/json"), Body::from(body.to_string())))
            .await
    }

    pub async fn get_with_token(&self, uri: &str, ip: &str, authorization: &str) -> Response {
        let mut req = request(Method::GET, uri, ip, None, Body::empty());
        req.headers_mut()
            .insert("authorization", authorization.parse().unwrap());
        self.send(req).await
    }

    pub fn events(&self) -> Vec<SecurityEvent> {
        self.state.audit_log.events()
    }
}

pub fn user(id: &str, active: bool) -> UserIdentity {
    UserIdentity {
        id: id.to_string(),
        email: format!("{id}@example.com"),
        is_active: active,
    }
}

/// Gateway in front of an echoing upstream, with default configuration.
pub async fn guard() -> TestGuard {
    guard_with(|_| {}).await
}

pub async fn guard_with(customize: impl FnOnce(&mut GuardConfig)) -> TestGuard {
    let upstream = start_upstream().await;
    let mut config = GuardConfig::default();
    config.upstream.base_url = format!("http://{upstream}");
    customize(&mut config);

    let clock = ManualClock::at_epoch_secs(START);
    let verifier = Arc::new(StubVerifier::default());
    let store = Arc::new(InMemoryIdentityStore::with_users([user("u1", true), user("dormant", false)]));

    let deps = GuardDeps {
        clock: Arc::new(clock.clone()),
        verifier: verifier.clone(),
        store: store.clone(),
        audit: Arc::new(TracingAuditSink),
    };
    let server = GuardServer::new(config, deps).unwrap();

    TestGuard {
        router: server.router(),
        state: server.state().clone(),
        clock,
        verifier,
        store,
    }
}

/// Request as if it arrived over a connection from `ip`.
pub fn request(method: Method, uri: &str, ip: &str, content_type: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header("content-type", content_type);
    }
    let mut request = builder.body(body).unwrap();
    let peer = SocketAddr::new(ip.parse().unwrap(), 40_000);
    request.extensions_mut().insert(ConnectInfo(peer));
    request
}

/// `Bearer` header value for an unsigned token with the given claims.
pub fn bearer(sub: &str, exp: u64) -> String {
    let payload = URL_SAFE_NO_PAD.encode(json!({ "sub": sub, "exp": exp }).to_string());
    format!("Bearer eyJhbGciOiJIUzI1NiJ9.{payload}.signature")
}

pub async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Upstream that echoes what it received as JSON.
pub async fn start_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().fallback(echo);

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Value> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "method": method.as_str(),
        "path": uri.path(),
        "query": uri.query(),
        "body": body,
        "userId": header("x-user-id"),
        "userEmail": header("x-user-email"),
        "requestId": header("x-request-id"),
    }))
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

//! Token authentication on protected routes.

use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, StatusCode};

use request_guard::auth::VerificationError;

mod common;
use common::{bearer, guard, guard_with, json_body, request, START};

const CLIENT: &str = "192.0.2.44";

async fn assert_unauthorized(response: axum::response::Response, message: &str) {
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["errorCode"], "UNAUTHORIZED");
    assert_eq!(body["message"], message);
}

#[tokio::test]
async fn test_missing_token() {
    let guard = guard().await;
    assert_unauthorized(guard.get("/api/stories", CLIENT).await, "no token provided").await;

    // Authentication failures are not audited and do not block.
    assert!(guard.events().is_empty());
    assert!(!guard.state.blocklist.is_blocked(CLIENT));
}

#[tokio::test]
async fn test_wrong_scheme() {
    let guard = guard().await;
    let response = guard.get_with_token("/api/stories", CLIENT, "Basic dXNlcjpwYXNz").await;
    assert_unauthorized(response, "invalid token format").await;
}

#[tokio::test]
async fn test_undecodable_token() {
    let guard = guard().await;
    let response = guard.get_with_token("/api/stories", CLIENT, "Bearer not-a-jwt").await;
    assert_unauthorized(response, "invalid token format").await;
    assert_eq!(guard.verifier.calls(), 0);
}

#[tokio::test]
async fn test_expired_token_never_reaches_verifier() {
    let guard = guard().await;
    let response = guard
        .get_with_token("/api/stories", CLIENT, &bearer("u1", START - 1))
        .await;
    assert_unauthorized(response, "token expired").await;
    assert_eq!(guard.verifier.calls(), 0);
}

#[tokio::test]
async fn test_valid_token_forwards_identity() {
    let guard = guard().await;

    let mut req = request(Method::GET, "/api/stories", CLIENT, None, Body::empty());
    req.headers_mut()
        .insert("authorization", bearer("u1", START + 3600).parse().unwrap());
    req.headers_mut().insert("x-user-id", "admin".parse().unwrap());

    let response = guard.send(req).await;
    assert_eq!(response.status(), StatusCode::OK);
    let echoed = json_body(response).await;
    assert_eq!(echoed["userId"], "u1");
    assert_eq!(echoed["userEmail"], "u1@example.com");
}

#[tokio::test]
async fn test_cached_identity_until_ttl() {
    let guard = guard().await;
    let token = bearer("u1", START + 3600);

    let first = guard.get_with_token("/api/stories", CLIENT, &token).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(guard.verifier.calls(), 1);

    guard.clock.advance(Duration::from_secs(299));
    let second = guard.get_with_token("/api/stories", CLIENT, &token).await;
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(guard.verifier.calls(), 1);

    guard.clock.advance(Duration::from_secs(1));
    let third = guard.get_with_token("/api/stories", CLIENT, &token).await;
    assert_eq!(third.status(), StatusCode::OK);
    assert_eq!(guard.verifier.calls(), 2);
}

#[tokio::test]
async fn test_unknown_user() {
    let guard = guard().await;
    let response = guard
        .get_with_token("/api/stories", CLIENT, &bearer("ghost", START + 60))
        .await;
    assert_unauthorized(response, "user not found").await;
}

#[tokio::test]
async fn test_inactive_account() {
    let guard = guard().await;
    let response = guard
        .get_with_token("/api/stories", CLIENT, &bearer("dormant", START + 60))
        .await;
    assert_unauthorized(response, "account inactive").await;
}

#[tokio::test]
async fn test_deactivation_after_revocation() {
    let guard = guard().await;
    let token = bearer("u1", START + 3600);
    assert_eq!(
        guard.get_with_token("/api/stories", CLIENT, &token).await.status(),
        StatusCode::OK
    );

    guard.store.set_active("u1", false);
    assert_eq!(guard.state.token_cache.invalidate_subject("u1"), 1);

    let response = guard.get_with_token("/api/stories", CLIENT, &token).await;
    assert_unauthorized(response, "account inactive").await;
}

#[tokio::test]
async fn test_verifier_error_classes() {
    let guard = guard().await;
    let token = bearer("u1", START + 60);

    guard.verifier.fail_with(VerificationError::InvalidSignature);
    assert_unauthorized(
        guard.get_with_token("/api/stories", CLIENT, &token).await,
        "invalid token signature",
    )
    .await;

    guard.verifier.fail_with(VerificationError::Other("audience mismatch".into()));
    assert_unauthorized(
        guard.get_with_token("/api/stories", CLIENT, &token).await,
        "authentication failed",
    )
    .await;

    guard.verifier.fail_with(VerificationError::Transport("connection refused".into()));
    let response = guard.get_with_token("/api/stories", CLIENT, &token).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_public_paths_skip_authentication() {
    let guard = guard().await;

    let response = guard
        .post_json("/api/auth/login", CLIENT, r#"{"email":"u1@example.com"}"#)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["userId"], serde_json::Value::Null);
    assert_eq!(guard.verifier.calls(), 0);
}

#[tokio::test]
async fn test_sensitive_route_limit_is_per_endpoint() {
    let guard = guard_with(|config| {
        config.rate_limit.max_requests = 1000;
        config.route_rate_limit.max_requests = 5;
    })
    .await;

    for _ in 0..5 {
        let response = guard.post_json("/api/auth/login", CLIENT, "{}").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
    let response = guard.post_json("/api/auth/login", CLIENT, "{}").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Separate endpoint, separate window.
    let response = guard.post_json("/api/auth/signup", CLIENT, "{}").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(guard.state.route_limiter.len(), 2);
}

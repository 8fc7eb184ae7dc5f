//! Authentication stage of the request pipeline.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::AuthenticatedUser;
use crate::error::GuardError;
use crate::http::server::AppState;

/// Require a valid bearer token on protected paths.
///
/// The resolved identity is stored as an [`AuthenticatedUser`] extension for the
/// forwarding stage.
pub async fn require_auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if !state.routes.is_protected(request.uri().path()) {
        return next.run(request).await;
    }

    // A header that is not visible ASCII cannot carry a bearer token.
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_string());

    match state.authenticator.authenticate(authorization.as_deref()).await {
        Ok(identity) => {
            request.extensions_mut().insert(AuthenticatedUser(identity));
            next.run(request).await
        }
        Err(e) => GuardError::from(e).into_response(),
    }
}

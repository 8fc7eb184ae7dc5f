use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};

/// Expected `Authorization` value for admin calls.
#[derive(Debug, Clone)]
pub struct AdminKey {
    expected: String,
}

impl AdminKey {
    pub fn new(api_key: &str) -> Self {
        Self {
            expected: format!("Bearer {api_key}"),
        }
    }

    pub fn accepts(&self, header: Option<&str>) -> bool {
        header == Some(self.expected.as_str())
    }
}

pub async fn admin_auth_middleware(
    State(key): State<Arc<AdminKey>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    if key.accepts(auth_header) {
        return Ok(next.run(request).await);
    }

    tracing::warn!("Rejected admin request with missing or wrong API key");
    Err(StatusCode::UNAUTHORIZED)
}

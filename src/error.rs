//! Error taxonomy for the request pipeline.
//!
//! Every rejection the gateway produces is a [`GuardError`]. Each variant maps to
//! one HTTP status and one stable error code, and renders as the structured body
//! `{"statusCode", "errorCode", "message", "timestamp"}`.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to clients by the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardError {
    /// Malformed, suspicious, oversized or wrongly typed request (400).
    #[error("{0}")]
    Validation(String),

    /// Source address is on the blocklist (403).
    #[error("{0}")]
    Forbidden(String),

    /// Missing, invalid or expired credentials, or an unusable account (401).
    #[error("{0}")]
    Authentication(String),

    /// Request quota for the current window is exhausted (429).
    #[error("{message}")]
    RateLimited {
        message: String,
        limit: u64,
        retry_after_secs: u64,
    },

    /// Identity provider or upstream transport failure (502).
    #[error("{0}")]
    Upstream(String),
}

/// Result type for pipeline operations.
pub type GuardResult<T> = Result<T, GuardError>;

impl GuardError {
    pub fn status(&self) -> StatusCode {
        match self {
            GuardError::Validation(_) => StatusCode::BAD_REQUEST,
            GuardError::Forbidden(_) => StatusCode::FORBIDDEN,
            GuardError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GuardError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            GuardError::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable code carried in the response body.
    pub fn error_code(&self) -> &'static str {
        match self {
            GuardError::Validation(_) => "BAD_REQUEST",
            GuardError::Forbidden(_) => "FORBIDDEN",
            GuardError::Authentication(_) => "UNAUTHORIZED",
            GuardError::RateLimited { .. } => "TOO_MANY_REQUESTS",
            GuardError::Upstream(_) => "BAD_GATEWAY",
        }
    }
}

/// Wire shape of every rejection body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub error_code: String,
    pub message: String,
    pub timestamp: String,
}

impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            status_code: status.as_u16(),
            error_code: self.error_code().to_string(),
            message: self.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let mut response = (status, Json(body)).into_response();

        if let GuardError::RateLimited {
            limit,
            retry_after_secs,
            ..
        } = self
        {
            let headers = response.headers_mut();
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
            headers.insert("x-ratelimit-limit", HeaderValue::from(limit));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(0u64));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(GuardError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(GuardError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(GuardError::Authentication("x".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(GuardError::Upstream("x".into()).status(), StatusCode::BAD_GATEWAY);
        let limited = GuardError::RateLimited {
            message: "Too Many Requests".into(),
            limit: 100,
            retry_after_secs: 12,
        };
        assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(limited.error_code(), "TOO_MANY_REQUESTS");
    }

    #[tokio::test]
    async fn test_rate_limited_response_headers() {
        let response = GuardError::RateLimited {
            message: "Too Many Requests".into(),
            limit: 100,
            retry_after_secs: 42,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert_eq!(response.headers()["x-ratelimit-limit"], "100");
        assert_eq!(response.headers()["x-ratelimit-remaining"], "0");
    }

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = GuardError::Forbidden("Access Denied".into()).into_response();
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(body.status_code, 403);
        assert_eq!(body.error_code, "FORBIDDEN");
        assert_eq!(body.message, "Access Denied");
        assert!(!body.timestamp.is_empty());
    }
}

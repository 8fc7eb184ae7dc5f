//! Forwarding accepted requests to the protected application.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri, Version},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::auth::AuthenticatedUser;
use crate::error::GuardError;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_EMAIL: HeaderName = HeaderName::from_static("x-user-email");

/// Connection-scoped headers that must not be relayed.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

pub type UpstreamClient = Client<HttpConnector, Body>;

/// Where accepted requests go.
#[derive(Clone)]
pub struct Upstream {
    client: UpstreamClient,
    base: Uri,
}

impl Upstream {
    pub fn new(base: Uri) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, base }
    }

    pub fn base(&self) -> &Uri {
        &self.base
    }

    /// Base URI joined with the request's path and query.
    pub fn target(&self, original: &Uri) -> Result<Uri, GuardError> {
        let base_path = self.base.path().trim_end_matches('/');
        let path_and_query = original
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let mut builder = Uri::builder().path_and_query(format!("{base_path}{path_and_query}"));
        if let Some(scheme) = self.base.scheme() {
            builder = builder.scheme(scheme.clone());
        }
        if let Some(authority) = self.base.authority() {
            builder = builder.authority(authority.clone());
        }
        builder
            .build()
            .map_err(|e| GuardError::Upstream(format!("invalid upstream uri: {e}")))
    }

    pub async fn forward(&self, request: Request<Body>) -> Result<Response, GuardError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = self.target(&parts.uri)?;
        parts.version = Version::HTTP_11;

        sanitize_headers(&mut parts.headers);
        if let Some(AuthenticatedUser(identity)) = parts.extensions.get::<AuthenticatedUser>() {
            insert_header(&mut parts.headers, X_USER_ID, &identity.id);
            insert_header(&mut parts.headers, X_USER_EMAIL, &identity.email);
        }

        let response = self
            .client
            .request(Request::from_parts(parts, body))
            .await
            .map_err(|e| GuardError::Upstream(format!("upstream request failed: {e}")))?;

        let (mut parts, body) = response.into_parts();
        for name in HOP_BY_HOP.iter() {
            parts.headers.remove(name);
        }
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Drop hop-by-hop headers, `Host`, and identity headers the client may have forged.
fn sanitize_headers(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
    headers.remove(header::HOST);
    headers.remove(X_USER_ID);
    headers.remove(X_USER_EMAIL);
}

fn insert_header(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "Identity value is not a valid header"),
    }
}

/// Terminal handler: relay the request upstream.
pub async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let request_id = request_id(request.headers()).to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match state.upstream.forward(request).await {
        Ok(response) => {
            metrics::record_request("forwarded");
            tracing::debug!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = %response.status(),
                "Forwarded request"
            );
            response
        }
        Err(e) => {
            metrics::record_request("upstream_error");
            tracing::error!(request_id = %request_id, path = %path, error = %e, "Upstream error");
            e.into_response()
        }
    }
}

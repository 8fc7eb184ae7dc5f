//! Client address resolution.

use std::net::SocketAddr;

use axum::{extract::ConnectInfo, http::Request};

/// Address used when neither the connection nor a trusted header names one.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Address the pipeline keys rate limits and blocks on.
///
/// With `trust_forwarded_for`, the first `X-Forwarded-For` entry wins; otherwise
/// the peer address of the TCP connection is used.
pub fn client_ip<B>(request: &Request<B>, trust_forwarded_for: bool) -> String {
    if trust_forwarded_for {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

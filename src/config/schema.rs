//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section falls back to its defaults when omitted.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::auth::UserIdentity;

/// Root configuration for the request guard.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GuardConfig {
    /// Listener configuration (bind address, client address trust).
    pub listener: ListenerConfig,

    /// Where accepted requests are forwarded.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Global per-client rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Per-client-per-route rate limiting for sensitive endpoints.
    pub route_rate_limit: RouteRateLimitConfig,

    /// Request gate (WAF) settings.
    pub waf: WafConfig,

    /// Bearer token authentication.
    pub auth: AuthConfig,

    /// Identity lookup backend.
    pub identity: IdentityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Take the client address from the first `X-Forwarded-For` entry.
    /// Only enable behind a proxy that overwrites the header.
    pub trust_forwarded_for: bool,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            trust_forwarded_for: false,
        }
    }
}

/// Upstream application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the business application (e.g., "http://127.0.0.1:3000").
    pub base_url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Fixed-window rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests allowed per key within one window.
    pub max_requests: u64,

    /// Interval between sweeps of elapsed windows, in seconds.
    pub sweep_interval_secs: u64,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 100,
            sweep_interval_secs: 60,
        }
    }
}

/// Rate limiting keyed by client address and endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteRateLimitConfig {
    pub enabled: bool,
    pub window_ms: u64,
    pub max_requests: u64,

    /// Exact request paths guarded by this limiter.
    pub paths: Vec<String>,
}

impl RouteRateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

impl Default for RouteRateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            max_requests: 100,
            paths: vec!["/api/auth/login".to_string(), "/api/auth/signup".to_string()],
        }
    }
}

/// Request gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WafConfig {
    /// Enable the request gate.
    pub enabled: bool,

    /// How long a violating address stays blocked, in seconds.
    pub block_duration_secs: u64,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: u64,

    /// Require `application/json` on state-changing methods.
    pub require_json_for_writes: bool,

    /// Detection patterns per category.
    pub rules: RulesConfig,

    /// Response headers attached to accepted requests.
    pub headers: SecurityHeadersConfig,
}

impl WafConfig {
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }
}

impl Default for WafConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            block_duration_secs: 3600,
            max_body_bytes: 1024 * 1024,
            require_json_for_writes: true,
            rules: RulesConfig::default(),
            headers: SecurityHeadersConfig::default(),
        }
    }
}

/// Ordered regular expressions per detection category.
///
/// Patterns use `regex` crate syntax; prefix with `(?i)` for case-insensitive matching.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RulesConfig {
    pub sql_injection: Vec<String>,
    pub xss: Vec<String>,
    pub path_traversal: Vec<String>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            sql_injection: vec![
                r"(?i)(\s|'|`|--|#|/\*|\*/|;|DROP|DELETE|UPDATE|INSERT)\s+".to_string(),
                r"(?i)UNION(\s+ALL)?\s+SELECT".to_string(),
            ],
            xss: vec![
                r"(?i)<script\b[^>]*>(.*?)</script>".to_string(),
                r"(?i)javascript:".to_string(),
                r"(?i)on\w+\s*=".to_string(),
                r"(?i)data:\s*text/html".to_string(),
            ],
            path_traversal: vec![r"\.\.".to_string(), r"//".to_string(), r"\\\\.".to_string()],
        }
    }
}

/// Security response header values.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    pub content_security_policy: String,
    pub strict_transport_security: String,
    pub referrer_policy: String,
    pub permissions_policy: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            content_security_policy: [
                "default-src 'self'",
                "script-src 'self'",
                "style-src 'self'",
                "img-src 'self'",
                "font-src 'self'",
                "connect-src 'self'",
                "media-src 'self'",
                "object-src 'none'",
                "frame-ancestors 'none'",
            ]
            .join("; "),
            strict_transport_security: "max-age=31536000; includeSubDomains".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
            permissions_policy: [
                "camera=()",
                "microphone=()",
                "geolocation=()",
                "payment=()",
                "usb=()",
            ]
            .join(", "),
        }
    }
}

/// Bearer token authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path prefixes that require a bearer token.
    pub protected_prefixes: Vec<String>,

    /// Exact paths exempt from authentication even under a protected prefix.
    pub public_paths: Vec<String>,

    /// How long a verified identity is served from cache, in seconds.
    pub token_cache_ttl_secs: u64,

    /// Token verification backend.
    pub verifier: VerifierConfig,
}

impl AuthConfig {
    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.token_cache_ttl_secs)
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            protected_prefixes: vec!["/api".to_string()],
            public_paths: vec![
                "/api/auth/login".to_string(),
                "/api/auth/signup".to_string(),
                "/health".to_string(),
            ],
            token_cache_ttl_secs: 300,
            verifier: VerifierConfig::default(),
        }
    }
}

/// Token verification backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VerifierConfig {
    /// Verify HS256 tokens locally with a shared secret.
    Jwt {
        #[serde(default)]
        secret: String,
        #[serde(default)]
        audience: Option<String>,
        #[serde(default)]
        leeway_secs: u64,
    },
    /// Ask a remote identity provider (`GET {url}` with the bearer token).
    Http {
        url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_remote_timeout")]
        timeout_secs: u64,
    },
}

impl Default for VerifierConfig {
    fn default() -> Self {
        VerifierConfig::Jwt {
            secret: String::new(),
            audience: None,
            leeway_secs: 0,
        }
    }
}

/// Identity lookup backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdentityConfig {
    /// Fixed set of identities held in memory.
    Memory {
        #[serde(default)]
        users: Vec<UserIdentity>,
    },
    /// Remote user service (`GET {base_url}/users/{subject}`).
    Http {
        base_url: String,
        #[serde(default)]
        api_key: Option<String>,
        #[serde(default = "default_remote_timeout")]
        timeout_secs: u64,
    },
}

impl Default for IdentityConfig {
    fn default() -> Self {
        IdentityConfig::Memory { users: Vec::new() }
    }
}

fn default_remote_timeout() -> u64 {
    5
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,

    /// Number of recent security events kept for the admin API.
    pub audit_buffer: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
            audit_buffer: 256,
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

//! Configuration validation.
//!
//! Serde handles syntax; this module checks meaning. It returns every problem
//! found, not just the first, and runs before a config is accepted at startup
//! or on reload.

use std::net::SocketAddr;

use axum::http::HeaderValue;
use regex::Regex;
use thiserror::Error;

use crate::config::schema::{GuardConfig, IdentityConfig, RulesConfig, VerifierConfig};
use crate::security::blocklist::MAX_BLOCK_DURATION;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field}: invalid socket address `{value}`")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: invalid URL `{value}`")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field}: must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("waf.rules.{category}: invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        category: &'static str,
        pattern: String,
        reason: String,
    },

    #[error("waf.headers.{field}: not a valid header value")]
    InvalidHeader { field: &'static str },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GuardConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_url(&mut errors, "upstream.base_url", &config.upstream.base_url);

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    if config.rate_limit.enabled {
        check_nonzero(&mut errors, "rate_limit.window_ms", config.rate_limit.window_ms);
        check_nonzero(&mut errors, "rate_limit.max_requests", config.rate_limit.max_requests);
    }
    check_nonzero(
        &mut errors,
        "rate_limit.sweep_interval_secs",
        config.rate_limit.sweep_interval_secs,
    );
    if config.route_rate_limit.enabled {
        check_nonzero(&mut errors, "route_rate_limit.window_ms", config.route_rate_limit.window_ms);
        check_nonzero(
            &mut errors,
            "route_rate_limit.max_requests",
            config.route_rate_limit.max_requests,
        );
    }

    check_nonzero(&mut errors, "waf.block_duration_secs", config.waf.block_duration_secs);
    if config.waf.block_duration_secs > MAX_BLOCK_DURATION.as_secs() {
        errors.push(ValidationError::TooLarge {
            field: "waf.block_duration_secs",
            max: MAX_BLOCK_DURATION.as_secs(),
        });
    }
    check_nonzero(&mut errors, "waf.max_body_bytes", config.waf.max_body_bytes);
    errors.extend(validate_rules(&config.waf.rules));

    let headers = &config.waf.headers;
    for (field, value) in [
        ("content_security_policy", &headers.content_security_policy),
        ("strict_transport_security", &headers.strict_transport_security),
        ("referrer_policy", &headers.referrer_policy),
        ("permissions_policy", &headers.permissions_policy),
    ] {
        if HeaderValue::from_str(value).is_err() {
            errors.push(ValidationError::InvalidHeader { field });
        }
    }

    check_nonzero(&mut errors, "auth.token_cache_ttl_secs", config.auth.token_cache_ttl_secs);
    match &config.auth.verifier {
        VerifierConfig::Jwt { secret, .. } => {
            if secret.is_empty() {
                errors.push(ValidationError::Empty { field: "auth.verifier.secret" });
            }
        }
        VerifierConfig::Http { url, timeout_secs, .. } => {
            check_url(&mut errors, "auth.verifier.url", url);
            check_nonzero(&mut errors, "auth.verifier.timeout_secs", *timeout_secs);
        }
    }

    if let IdentityConfig::Http { base_url, timeout_secs, .. } = &config.identity {
        check_url(&mut errors, "identity.base_url", base_url);
        check_nonzero(&mut errors, "identity.timeout_secs", *timeout_secs);
    }

    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if config.admin.enabled {
        check_address(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::Empty { field: "admin.api_key" });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Compile every configured pattern, collecting the ones that fail.
pub fn validate_rules(rules: &RulesConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for (category, patterns) in [
        ("sql_injection", &rules.sql_injection),
        ("xss", &rules.xss),
        ("path_traversal", &rules.path_traversal),
    ] {
        for pattern in patterns {
            if let Err(e) = Regex::new(pattern) {
                errors.push(ValidationError::InvalidPattern {
                    category,
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    errors
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    let valid = url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https") && !u.cannot_be_a_base())
        .unwrap_or(false);
    if !valid {
        errors.push(ValidationError::InvalidUrl {
            field,
            value: value.to_string(),
        });
    }
}

fn check_nonzero(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::Zero { field });
    }
}

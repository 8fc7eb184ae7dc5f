//! Request gate: pattern-based threat detection and violator blocking.
//!
//! # Evaluation order
//! ```text
//! 1. client address on the blocklist          → 403 Access Denied
//! 2. serialized query: SQL injection, XSS      → 400
//!    serialized body:  SQL injection, XSS      → 400
//! 3. path: traversal patterns                  → 400
//! 4. state-changing method without JSON type   → 400
//! 5. declared or actual body over the size cap → 400
//! ```
//! The first failing check decides. Every rejection records a `waf-block`
//! audit event and then blocks the client address for the configured
//! duration. Accepted requests get the security response headers.
//!
//! Structured input is matched in its compact JSON serialization rather than
//! field by field, so a pattern can match across keys and values. False
//! positives are the accepted cost.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use http_body_util::LengthLimitError;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

use crate::clock::Clock;
use crate::config::WafConfig;
use crate::error::{GuardError, GuardResult};
use crate::http::client_ip::client_ip;
use crate::http::server::AppState;
use crate::observability::audit::{SecurityAuditSink, SecurityEvent};
use crate::observability::metrics;
use crate::security::blocklist::ViolationBlocklist;
use crate::security::headers::SecurityHeaders;
use crate::security::limits::ContentPolicy;
use crate::security::rules::{PatternRuleSet, RuleCategory};

/// The parts of a request the gate looks at.
#[derive(Debug, Clone)]
pub struct RequestView<'a> {
    pub ip: &'a str,
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub content_length: Option<u64>,
    pub body: &'a [u8],
    /// The body could not be buffered within the size cap.
    pub body_over_limit: bool,
}

/// Why the gate refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Blocked,
    Pattern(RuleCategory),
    ContentType,
    TooLarge,
}

impl RejectReason {
    pub fn message(&self) -> &'static str {
        match self {
            RejectReason::Blocked => "Access Denied",
            RejectReason::Pattern(category) => category.message(),
            RejectReason::ContentType => "Invalid Content-Type",
            RejectReason::TooLarge => "Request Too Large",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::Blocked => "blocked",
            RejectReason::Pattern(category) => category.as_str(),
            RejectReason::ContentType => "content_type",
            RejectReason::TooLarge => "too_large",
        }
    }

    pub fn into_error(self) -> GuardError {
        match self {
            RejectReason::Blocked => GuardError::Forbidden(self.message().to_string()),
            _ => GuardError::Validation(self.message().to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

/// Accepts or rejects requests and tracks violators.
pub struct RequestGate {
    rules: ArcSwap<PatternRuleSet>,
    blocklist: Arc<ViolationBlocklist>,
    audit: Arc<dyn SecurityAuditSink>,
    policy: ContentPolicy,
    headers: SecurityHeaders,
    block_duration: Duration,
    enabled: bool,
    clock: Arc<dyn Clock>,
}

impl RequestGate {
    /// Gate with the built-in rules, headers and limits.
    pub fn new(
        blocklist: Arc<ViolationBlocklist>,
        audit: Arc<dyn SecurityAuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let defaults = WafConfig::default();
        Self {
            rules: ArcSwap::from_pointee(PatternRuleSet::default()),
            blocklist,
            audit,
            policy: ContentPolicy::default(),
            headers: SecurityHeaders::default(),
            block_duration: defaults.block_duration(),
            enabled: defaults.enabled,
            clock,
        }
    }

    /// Gate built from validated configuration.
    pub fn from_config(
        config: &WafConfig,
        blocklist: Arc<ViolationBlocklist>,
        audit: Arc<dyn SecurityAuditSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GateBuildError> {
        Ok(Self {
            rules: ArcSwap::from_pointee(PatternRuleSet::from_config(&config.rules)?),
            blocklist,
            audit,
            policy: ContentPolicy::from_config(config),
            headers: SecurityHeaders::from_config(&config.headers)?,
            block_duration: config.block_duration(),
            enabled: config.enabled,
            clock,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn policy(&self) -> &ContentPolicy {
        &self.policy
    }

    pub fn headers(&self) -> &SecurityHeaders {
        &self.headers
    }

    pub fn blocklist(&self) -> &Arc<ViolationBlocklist> {
        &self.blocklist
    }

    /// Currently active rule set.
    pub fn rules(&self) -> Arc<PatternRuleSet> {
        self.rules.load_full()
    }

    /// Swap in a new rule set; requests already being inspected finish with the old one.
    pub fn reload_rules(&self, rules: PatternRuleSet) {
        tracing::info!(patterns = rules.len(), "WAF rules reloaded");
        self.rules.store(Arc::new(rules));
    }

    /// Decide on a request without side effects.
    pub fn inspect(&self, view: &RequestView<'_>) -> Verdict {
        if self.blocklist.is_blocked(view.ip) {
            return Verdict::Reject(RejectReason::Blocked);
        }

        let rules = self.rules.load();

        let query = canonical_query(view.query);
        if let Some(category) = rules.scan(&RuleCategory::CONTENT, &query) {
            return Verdict::Reject(RejectReason::Pattern(category));
        }

        let body = canonical_body(view.body);
        if let Some(category) = rules.scan(&RuleCategory::CONTENT, &body) {
            return Verdict::Reject(RejectReason::Pattern(category));
        }

        if rules.first_match(RuleCategory::PathTraversal, view.path).is_some() {
            return Verdict::Reject(RejectReason::Pattern(RuleCategory::PathTraversal));
        }

        if !self.policy.content_type_allowed(view.method, view.content_type) {
            return Verdict::Reject(RejectReason::ContentType);
        }

        if view.body_over_limit || !self.policy.length_allowed(view.content_length) {
            return Verdict::Reject(RejectReason::TooLarge);
        }

        Verdict::Accept
    }

    /// Inspect a request and apply the consequences of a rejection.
    pub async fn enforce(&self, view: &RequestView<'_>) -> GuardResult<()> {
        let reason = match self.inspect(view) {
            Verdict::Accept => {
                metrics::record_request("accepted");
                return Ok(());
            }
            Verdict::Reject(reason) => reason,
        };

        tracing::warn!(
            ip = %view.ip,
            path = %view.path,
            reason = reason.message(),
            "Request rejected by gate"
        );

        self.audit
            .record(SecurityEvent::waf_block(view.ip, view.path, reason.message(), self.clock.now()))
            .await;
        self.blocklist.block(view.ip, self.block_duration);

        metrics::record_waf_block(reason.label());
        metrics::record_request("rejected");

        Err(reason.into_error())
    }
}

/// Error building a gate from configuration.
#[derive(Debug, thiserror::Error)]
pub enum GateBuildError {
    #[error(transparent)]
    Rules(#[from] crate::security::rules::RuleError),

    #[error("invalid security header value: {0}")]
    Header(#[from] header::InvalidHeaderValue),
}

/// Query string decoded into a JSON object and serialized compactly.
///
/// Repeated keys collect into an array in order of appearance.
pub fn canonical_query(query: Option<&str>) -> String {
    let mut object = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let value = Value::String(value.into_owned());
        match object.get_mut(&*key) {
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                object.insert(key.into_owned(), value);
            }
        }
    }
    Value::Object(object).to_string()
}

/// Body in compact JSON form when it parses as JSON, raw text otherwise.
pub fn canonical_body(body: &[u8]) -> String {
    if body.is_empty() {
        return "{}".to_string();
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(value) => value.to_string(),
        Err(_) => String::from_utf8_lossy(body).into_owned(),
    }
}

/// Whether a body read failed because it outgrew the buffering cap, as opposed
/// to a transport fault such as a reset connection.
fn exceeded_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

/// Gate middleware. Buffers the body (up to the size cap) so it can be inspected
/// and then handed on unchanged.
pub async fn waf_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let gate = &state.gate;
    if !gate.is_enabled() {
        return next.run(request).await;
    }

    let ip = client_ip(&request, state.routes.trust_forwarded_for);
    let (parts, body) = request.into_parts();

    let content_length = parts
        .headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    // A declared oversize body is rejected without reading it.
    let (bytes, body_over_limit) = if gate.policy().length_allowed(content_length) {
        let cap = usize::try_from(gate.policy().max_body_bytes).unwrap_or(usize::MAX);
        match axum::body::to_bytes(body, cap).await {
            Ok(bytes) => (bytes, false),
            Err(e) if exceeded_length_limit(&e) => {
                tracing::debug!(ip = %ip, error = %e, "Request body not buffered within cap");
                (Bytes::new(), true)
            }
            Err(e) => {
                tracing::debug!(ip = %ip, error = %e, "Request body could not be read");
                return GuardError::Validation("Invalid Request Body".into()).into_response();
            }
        }
    } else {
        (Bytes::new(), false)
    };

    let outcome = {
        let view = RequestView {
            ip: &ip,
            method: &parts.method,
            path: parts.uri.path(),
            query: parts.uri.query(),
            content_type: parts
                .headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            content_length,
            body: &bytes,
            body_over_limit,
        };
        gate.enforce(&view).await
    };

    if let Err(err) = outcome {
        return err.into_response();
    }

    let mut response = next.run(Request::from_parts(parts, Body::from(bytes))).await;
    gate.headers().apply(response.headers_mut());
    response
}

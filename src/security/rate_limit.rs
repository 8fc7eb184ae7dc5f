//! Fixed-window rate limiting.
//!
//! One [`FixedWindowCounter`] type backs both limiters: the global one keyed by
//! client address and the per-route one keyed by `address:path`.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::{mapref::entry::Entry, DashMap};

use crate::clock::{elapsed_between, Clock};
use crate::config::{RateLimitConfig, RouteRateLimitConfig};
use crate::error::GuardError;
use crate::http::client_ip::client_ip;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Latest window observed for a key.
#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u64,
    window_start: std::time::SystemTime,
}

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub allowed: bool,
    /// Requests counted in the current window, this one included.
    pub count: u64,
    pub limit: u64,
    /// Time until the current window ends.
    pub reset_after: Duration,
}

impl WindowDecision {
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.count)
    }

    /// Whole seconds a client should wait, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        let millis = self.reset_after.as_millis() as u64;
        millis.div_ceil(1000).max(1)
    }
}

/// Fixed-window request counter keyed by an arbitrary string.
///
/// A window opens on the first request for a key and lasts `window`. Every
/// request inside it increments the count, denied ones included, and requests
/// beyond `max_requests` are denied. The first request at or after the window
/// end opens a fresh window with a count of one.
#[derive(Debug)]
pub struct FixedWindowCounter {
    name: &'static str,
    windows: DashMap<String, RateWindow>,
    window: Duration,
    max_requests: u64,
    enabled: bool,
    clock: Arc<dyn Clock>,
}

impl FixedWindowCounter {
    pub fn new(name: &'static str, window: Duration, max_requests: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            windows: DashMap::new(),
            window,
            max_requests,
            enabled: true,
            clock,
        }
    }

    pub fn from_config(name: &'static str, config: &RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new(name, config.window(), config.max_requests, clock)
        }
    }

    pub fn from_route_config(config: &RouteRateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: config.enabled,
            ..Self::new("route", config.window(), config.max_requests, clock)
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Count a request for `key` and decide whether it may proceed.
    pub fn check(&self, key: &str) -> WindowDecision {
        if !self.enabled {
            return WindowDecision {
                allowed: true,
                count: 0,
                limit: self.max_requests,
                reset_after: Duration::ZERO,
            };
        }

        let now = self.clock.now();
        // The shard lock is held from lookup to update; no await in between.
        let window = match self.windows.entry(key.to_owned()) {
            Entry::Vacant(vacant) => *vacant.insert(RateWindow {
                count: 1,
                window_start: now,
            }),
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if elapsed_between(entry.window_start, now) >= self.window {
                    entry.count = 1;
                    entry.window_start = now;
                } else {
                    entry.count = entry.count.saturating_add(1);
                }
                *entry
            }
        };

        let elapsed = elapsed_between(window.window_start, now);
        WindowDecision {
            allowed: window.count <= self.max_requests,
            count: window.count,
            limit: self.max_requests,
            reset_after: self.window.saturating_sub(elapsed),
        }
    }

    /// Boolean form of [`check`](Self::check).
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).allowed
    }

    /// Drop windows that have elapsed. Returns how many were removed.
    ///
    /// An elapsed window would be reset on its next request anyway, so sweeping
    /// never changes a decision.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows
            .retain(|_, w| elapsed_between(w.window_start, now) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    fn reject(&self, key: &str, decision: &WindowDecision) -> GuardError {
        tracing::warn!(limiter = self.name, key = %key, count = decision.count, "Rate limit exceeded");
        metrics::record_rate_limited(self.name);
        GuardError::RateLimited {
            message: "Too Many Requests".to_string(),
            limit: decision.limit,
            retry_after_secs: decision.retry_after_secs(),
        }
    }
}

/// Global limiter: every request, keyed by client address.
pub async fn global_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let ip = client_ip(&request, state.routes.trust_forwarded_for);
    let decision = state.global_limiter.check(&ip);

    if decision.allowed {
        next.run(request).await
    } else {
        state.global_limiter.reject(&ip, &decision).into_response()
    }
}

/// Route limiter: only configured sensitive paths, keyed by `address:path`.
pub async fn route_rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !state.routes.is_sensitive(path) {
        return next.run(request).await;
    }

    let ip = client_ip(&request, state.routes.trust_forwarded_for);
    let key = format!("{ip}:{path}");
    let decision = state.route_limiter.check(&key);

    if decision.allowed {
        next.run(request).await
    } else {
        state.route_limiter.reject(&key, &decision).into_response()
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by outcome (accepted, rejected)
//! - `guard_waf_blocks_total` (counter): gate rejections by category
//! - `guard_rate_limited_total` (counter): denials by limiter
//! - `guard_auth_failures_total` (counter): authentication failures by reason
//! - `guard_token_cache_total` (counter): token cache lookups by result
//! - `guard_blocklist_size` (gauge): stored blocklist entries
//!
//! Recording is a no-op until a recorder is installed, so library users and
//! tests pay nothing for it.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(outcome: &'static str) {
    counter!("guard_requests_total", "outcome" => outcome).increment(1);
}

pub fn record_waf_block(category: &'static str) {
    counter!("guard_waf_blocks_total", "category" => category).increment(1);
}

pub fn record_rate_limited(limiter: &'static str) {
    counter!("guard_rate_limited_total", "limiter" => limiter).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!("guard_auth_failures_total", "reason" => reason).increment(1);
}

pub fn record_token_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("guard_token_cache_total", "result" => result).increment(1);
}

pub fn record_blocklist_size(size: usize) {
    gauge!("guard_blocklist_size").set(size as f64);
}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::audit::SecurityEvent;
use crate::security::blocklist::BlockEntry;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub blocked_addresses: usize,
    pub cached_tokens: usize,
    pub global_windows: usize,
    pub route_windows: usize,
    pub waf_patterns: usize,
    pub recent_events: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        blocked_addresses: state.blocklist.entries().len(),
        cached_tokens: state.token_cache.len(),
        global_windows: state.global_limiter.len(),
        route_windows: state.route_limiter.len(),
        waf_patterns: state.gate.rules().len(),
        recent_events: state.audit_log.len(),
    })
}

pub async fn get_blocklist(State(state): State<AppState>) -> Json<Vec<BlockEntry>> {
    Json(state.blocklist.entries())
}

pub async fn delete_block(State(state): State<AppState>, Path(ip): Path<String>) -> StatusCode {
    if state.blocklist.unblock(&ip) {
        tracing::info!(ip = %ip, "Address unblocked by operator");
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

pub async fn get_events(State(state): State<AppState>) -> Json<Vec<SecurityEvent>> {
    Json(state.audit_log.events())
}

#[derive(Debug, Serialize)]
pub struct RevokeResult {
    pub subject: String,
    pub revoked: usize,
}

pub async fn revoke_subject(State(state): State<AppState>, Path(subject): Path<String>) -> Json<RevokeResult> {
    let revoked = state.token_cache.invalidate_subject(&subject);
    tracing::info!(subject = %subject, revoked, "Cached tokens revoked by operator");
    Json(RevokeResult { subject, revoked })
}

//! Operator API for inspecting and correcting pipeline state.
//!
//! Served on its own listener, guarded by a bearer API key.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get},
    Router,
};

use self::auth::{admin_auth_middleware, AdminKey};
use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_admin_router(state: AppState, api_key: &str) -> Router {
    let key = Arc::new(AdminKey::new(api_key));

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/blocklist", get(get_blocklist))
        .route("/admin/blocklist/{ip}", delete(delete_block))
        .route("/admin/events", get(get_events))
        .route("/admin/tokens/subject/{subject}", delete(revoke_subject))
        .layer(middleware::from_fn_with_state(key, admin_auth_middleware))
        .with_state(state)
}

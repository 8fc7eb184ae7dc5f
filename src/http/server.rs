//! Gateway server setup.
//!
//! # Responsibilities
//! - Build the pipeline components from configuration
//! - Wire them into the Axum router in pipeline order
//! - Serve with connection info and graceful shutdown
//! - Apply hot-reloaded rule sets and run the state sweeper

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::uri::InvalidUri,
    middleware::from_fn_with_state,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::auth::{
    require_auth_middleware, HttpIdentityStore, HttpTokenVerifier, IdentityStore, InMemoryIdentityStore,
    JwtVerifier, StoreError, TokenAuthenticator, TokenCache, TokenVerifier,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{GuardConfig, IdentityConfig, VerifierConfig};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::routes::RoutePolicy;
use crate::http::upstream::{forward_handler, Upstream};
use crate::observability::audit::{FanoutAuditSink, MemoryAuditSink, SecurityAuditSink, TracingAuditSink};
use crate::security::blocklist::ViolationBlocklist;
use crate::security::rate_limit::{global_rate_limit_middleware, route_rate_limit_middleware, FixedWindowCounter};
use crate::security::rules::PatternRuleSet;
use crate::security::sweeper::Sweeper;
use crate::security::waf::{waf_middleware, GateBuildError, RequestGate};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid WAF configuration: {0}")]
    Gate(#[from] GateBuildError),

    #[error("invalid upstream url: {0}")]
    UpstreamUrl(#[from] InvalidUri),

    #[error("failed to build token verifier: {0}")]
    Verifier(#[from] reqwest::Error),

    #[error("failed to build identity store: {0}")]
    Store(#[from] StoreError),
}

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<RequestGate>,
    pub global_limiter: Arc<FixedWindowCounter>,
    pub route_limiter: Arc<FixedWindowCounter>,
    pub authenticator: Arc<TokenAuthenticator>,
    pub token_cache: Arc<TokenCache>,
    pub blocklist: Arc<ViolationBlocklist>,
    pub audit_log: Arc<MemoryAuditSink>,
    pub routes: Arc<RoutePolicy>,
    pub upstream: Upstream,
    pub started_at: Instant,
}

/// External collaborators of the pipeline.
#[derive(Clone)]
pub struct GuardDeps {
    pub clock: Arc<dyn Clock>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub store: Arc<dyn IdentityStore>,
    pub audit: Arc<dyn SecurityAuditSink>,
}

impl GuardDeps {
    /// System clock, tracing audit sink, and the configured verifier and store.
    pub fn from_config(config: &GuardConfig) -> Result<Self, ServerError> {
        let verifier: Arc<dyn TokenVerifier> = match &config.auth.verifier {
            VerifierConfig::Jwt {
                secret,
                audience,
                leeway_secs,
            } => Arc::new(JwtVerifier::new(secret, audience.as_deref(), *leeway_secs)),
            VerifierConfig::Http {
                url,
                api_key,
                timeout_secs,
            } => Arc::new(HttpTokenVerifier::new(
                url.clone(),
                api_key.clone(),
                Duration::from_secs(*timeout_secs),
            )?),
        };

        let store: Arc<dyn IdentityStore> = match &config.identity {
            IdentityConfig::Memory { users } => Arc::new(InMemoryIdentityStore::with_users(users.iter().cloned())),
            IdentityConfig::Http {
                base_url,
                api_key,
                timeout_secs,
            } => Arc::new(HttpIdentityStore::new(
                base_url,
                api_key.clone(),
                Duration::from_secs(*timeout_secs),
            )?),
        };

        Ok(Self {
            clock: Arc::new(SystemClock),
            verifier,
            store,
            audit: Arc::new(TracingAuditSink),
        })
    }
}

/// The request-security gateway.
pub struct GuardServer {
    router: Router,
    state: AppState,
    config: GuardConfig,
}

impl GuardServer {
    pub fn new(config: GuardConfig, deps: GuardDeps) -> Result<Self, ServerError> {
        let clock = deps.clock;

        let blocklist = Arc::new(ViolationBlocklist::new(clock.clone()));
        let audit_log = Arc::new(MemoryAuditSink::new(config.observability.audit_buffer));
        let audit: Arc<dyn SecurityAuditSink> = Arc::new(FanoutAuditSink::new(vec![deps.audit, audit_log.clone()]));
        let gate = Arc::new(RequestGate::from_config(&config.waf, blocklist.clone(), audit, clock.clone())?);

        let global_limiter = Arc::new(FixedWindowCounter::from_config("global", &config.rate_limit, clock.clone()));
        let route_limiter = Arc::new(FixedWindowCounter::from_route_config(&config.route_rate_limit, clock.clone()));

        let token_cache = Arc::new(TokenCache::new(config.auth.token_cache_ttl(), clock.clone()));
        let authenticator = Arc::new(TokenAuthenticator::new(
            deps.verifier,
            deps.store,
            token_cache.clone(),
            clock,
        ));

        let state = AppState {
            gate,
            global_limiter,
            route_limiter,
            authenticator,
            token_cache,
            blocklist,
            audit_log,
            routes: Arc::new(RoutePolicy::from_config(&config)),
            upstream: Upstream::new(config.upstream.base_url.parse()?),
            started_at: Instant::now(),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self { router, state, config })
    }

    /// Layers run outermost first: trace, request id, timeout, global limiter,
    /// request gate, route limiter, authentication, then the handler.
    #[allow(deprecated)]
    fn build_router(config: &GuardConfig, state: AppState) -> Router {
        Router::new()
            .route("/health", get(health_handler))
            .fallback(forward_handler)
            .layer(from_fn_with_state(state.clone(), require_auth_middleware))
            .layer(from_fn_with_state(state.clone(), route_rate_limit_middleware))
            .layer(from_fn_with_state(state.clone(), waf_middleware))
            .layer(from_fn_with_state(state.clone(), global_rate_limit_middleware))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Serve until `shutdown` fires.
    ///
    /// Configs arriving on `config_updates` replace the WAF rule set; counters,
    /// blocks and cached tokens carry over.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GuardConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, upstream = %self.state.upstream.base(), "Gateway starting");

        let sweeper = Sweeper::new(
            vec![self.state.global_limiter.clone(), self.state.route_limiter.clone()],
            self.state.blocklist.clone(),
            self.state.token_cache.clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs.max(1)),
        );
        tokio::spawn(sweeper.run(shutdown.resubscribe()));
        tokio::spawn(apply_config_updates(
            self.state.gate.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Gateway draining connections");
            })
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

async fn apply_config_updates(
    gate: Arc<RequestGate>,
    mut updates: mpsc::UnboundedReceiver<GuardConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let Some(config) = update else { break };
                match PatternRuleSet::from_config(&config.waf.rules) {
                    Ok(rules) => gate.reload_rules(rules),
                    Err(e) => tracing::error!(error = %e, "Rejected reloaded WAF rules"),
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

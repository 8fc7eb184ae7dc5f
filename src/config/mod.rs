//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, env overrides)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and validates
//!     → server swaps the live WAF rule set
//! ```
//!
//! Counters, the blocklist and the token cache are runtime state and survive
//! reloads; only the detection rules are swapped.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, AuthConfig, GuardConfig, IdentityConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, RateLimitConfig, RouteRateLimitConfig, RulesConfig,
    SecurityHeadersConfig, TimeoutConfig, UpstreamConfig, VerifierConfig, WafConfig,
};

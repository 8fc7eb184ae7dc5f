//! Request-security gateway library.
//!
//! Inspects, throttles and authenticates inbound HTTP requests before they
//! reach the application behind it.

pub mod admin;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::schema::GuardConfig;
pub use error::{GuardError, GuardResult};
pub use http::{GuardDeps, GuardServer};
pub use lifecycle::Shutdown;

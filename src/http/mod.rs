//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (assign X-Request-ID)
//!     → security::rate_limit (global, per client address)
//!     → security::waf (blocklist, patterns, content policy)
//!     → security::rate_limit (per address and sensitive path)
//!     → auth::middleware (protected paths only)
//!     → upstream.rs (forward with identity headers)
//! ```

pub mod client_ip;
pub mod request;
pub mod routes;
pub mod server;
pub mod upstream;

pub use client_ip::client_ip;
pub use request::X_REQUEST_ID;
pub use routes::RoutePolicy;
pub use server::{AppState, GuardDeps, GuardServer, ServerError};
pub use upstream::{Upstream, X_USER_EMAIL, X_USER_ID};

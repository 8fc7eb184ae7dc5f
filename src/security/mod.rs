//! Request security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (fixed window per client address)
//!     → waf.rs (blocklist, rules.rs patterns, limits.rs content policy)
//!     → headers.rs (security headers on accepted responses)
//!     → rate_limit.rs (fixed window per address and sensitive path)
//!     → Pass to authentication
//! ```
//!
//! # Design Decisions
//! - Fail closed: a request that cannot be inspected is rejected
//! - Pattern checks run on the serialized query and body, not per field
//! - Every gate rejection is audited and blocks the source address
//! - State is process-local; instances do not share counters or blocks

pub mod blocklist;
pub mod headers;
pub mod limits;
pub mod rate_limit;
pub mod rules;
pub mod sweeper;
pub mod waf;

pub use blocklist::{BlockEntry, ViolationBlocklist};
pub use rate_limit::{FixedWindowCounter, WindowDecision};
pub use rules::{PatternRuleSet, RuleCategory};
pub use waf::{RejectReason, RequestGate, RequestView, Verdict};

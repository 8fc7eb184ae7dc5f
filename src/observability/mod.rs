//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Pipeline components produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and gauges)
//!     → audit.rs (security event records for the audit sink)
//! ```
//!
//! Audit events and logs are separate streams: every gate rejection produces an
//! audit event, while authentication failures are only logged and counted.

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{FanoutAuditSink, MemoryAuditSink, SecurityAuditSink, SecurityEvent, TracingAuditSink};

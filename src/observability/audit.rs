//! Security event records and the sinks that receive them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Event type recorded for every request gate rejection.
pub const WAF_BLOCK: &str = "waf-block";

/// A structured security event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub event_type: String,
    pub ip: String,
    pub path: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl SecurityEvent {
    pub fn waf_block(ip: &str, path: &str, reason: &str, at: SystemTime) -> Self {
        Self {
            event_type: WAF_BLOCK.to_string(),
            ip: ip.to_string(),
            path: path.to_string(),
            reason: reason.to_string(),
            timestamp: at.into(),
        }
    }
}

/// Receiver of security events.
#[async_trait]
pub trait SecurityAuditSink: Send + Sync {
    async fn record(&self, event: SecurityEvent);
}

/// Writes events to the `security_audit` tracing target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

#[async_trait]
impl SecurityAuditSink for TracingAuditSink {
    async fn record(&self, event: SecurityEvent) {
        tracing::warn!(
            target: "security_audit",
            event_type = %event.event_type,
            ip = %event.ip,
            path = %event.path,
            reason = %event.reason,
            timestamp = %event.timestamp.to_rfc3339(),
            "Security event"
        );
    }
}

/// Keeps the most recent events in memory.
#[derive(Debug)]
pub struct MemoryAuditSink {
    events: Mutex<VecDeque<SecurityEvent>>,
    capacity: usize,
}

impl MemoryAuditSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Recorded events, oldest first.
    pub fn events(&self) -> Vec<SecurityEvent> {
        self.events
            .lock()
            .expect("audit buffer mutex poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().expect("audit buffer mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SecurityAuditSink for MemoryAuditSink {
    async fn record(&self, event: SecurityEvent) {
        let mut events = self.events.lock().expect("audit buffer mutex poisoned");
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }
}

/// Delivers each event to every inner sink in order.
#[derive(Clone, Default)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn SecurityAuditSink>>,
}

impl FanoutAuditSink {
    pub fn new(sinks: Vec<Arc<dyn SecurityAuditSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl SecurityAuditSink for FanoutAuditSink {
    async fn record(&self, event: SecurityEvent) {
        for sink in &self.sinks {
            sink.record(event.clone()).await;
        }
    }
}

//! Temporarily blocked client addresses.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;
use serde::Serialize;

use crate::clock::Clock;
use crate::observability::metrics;

/// Longest block a single violation can impose. Longer requests are clamped.
pub const MAX_BLOCK_DURATION: Duration = Duration::from_secs(10 * 365 * 24 * 3600);

/// An address and the instant its block ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockEntry {
    pub ip: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Client addresses denied service until an expiry instant.
///
/// Expiry is evaluated on lookup: an entry whose expiry has passed is removed
/// the next time it is queried and is never reported as blocked. [`sweep`]
/// clears expired entries that are no longer being queried.
///
/// [`sweep`]: ViolationBlocklist::sweep
#[derive(Debug)]
pub struct ViolationBlocklist {
    entries: DashMap<String, SystemTime>,
    clock: Arc<dyn Clock>,
}

impl ViolationBlocklist {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Block `ip` for `duration` from now, replacing any existing expiry.
    ///
    /// `duration` is clamped to [`MAX_BLOCK_DURATION`].
    pub fn block(&self, ip: &str, duration: Duration) -> SystemTime {
        let now = self.clock.now();
        let expires_at = now
            .checked_add(duration.min(MAX_BLOCK_DURATION))
            .unwrap_or(now);
        self.entries.insert(ip.to_owned(), expires_at);
        metrics::record_blocklist_size(self.entries.len());
        expires_at
    }

    pub fn is_blocked(&self, ip: &str) -> bool {
        self.blocked_until(ip).is_some()
    }

    /// Expiry of an active block on `ip`, evicting the entry if it has lapsed.
    pub fn blocked_until(&self, ip: &str) -> Option<SystemTime> {
        let now = self.clock.now();
        let expires_at = *self.entries.get(ip)?.value();
        if expires_at > now {
            return Some(expires_at);
        }

        // Re-check under the write lock: a concurrent block() may have refreshed it.
        if self.entries.remove_if(ip, |_, exp| *exp <= now).is_some() {
            tracing::info!(ip = %ip, "Block expired");
            metrics::record_blocklist_size(self.entries.len());
        }
        None
    }

    /// Lift a block early. Returns whether an active block was removed.
    pub fn unblock(&self, ip: &str) -> bool {
        let now = self.clock.now();
        let removed = self
            .entries
            .remove(ip)
            .map(|(_, expires_at)| expires_at > now)
            .unwrap_or(false);
        metrics::record_blocklist_size(self.entries.len());
        removed
    }

    /// Snapshot of active blocks, soonest expiry first.
    pub fn entries(&self) -> Vec<BlockEntry> {
        let now = self.clock.now();
        let mut active: Vec<(String, SystemTime)> = self
            .entries
            .iter()
            .filter(|e| *e.value() > now)
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        active.sort_by_key(|(_, expires_at)| *expires_at);
        active
            .into_iter()
            .map(|(ip, expires_at)| BlockEntry {
                ip,
                expires_at: expires_at.into(),
            })
            .collect()
    }

    /// Remove every lapsed entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, expires_at| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            metrics::record_blocklist_size(self.entries.len());
        }
        removed
    }

    /// Number of stored entries, lapsed ones not yet evicted included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn blocklist() -> (ViolationBlocklist, ManualClock) {
        let clock = ManualClock::at_epoch_secs(1_700_000_000);
        (ViolationBlocklist::new(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_block_and_expire() {
        let (list, clock) = blocklist();
        list.block("10.0.0.1", HOUR);
        assert!(list.is_blocked("10.0.0.1"));
        assert!(!list.is_blocked("10.0.0.2"));

        clock.advance(HOUR - Duration::from_millis(1));
        assert!(list.is_blocked("10.0.0.1"));

        clock.advance(Duration::from_millis(1));
        assert!(!list.is_blocked("10.0.0.1"));
        assert!(list.is_empty(), "lapsed entry evicted on lookup");
    }

    #[test]
    fn test_never_blocked_long_after_expiry() {
        let (list, clock) = blocklist();
        list.block("10.0.0.1", Duration::from_secs(1));
        clock.advance(Duration::from_secs(365 * 24 * 3600));
        assert!(!list.is_blocked("10.0.0.1"));
        assert_eq!(list.blocked_until("10.0.0.1"), None);
    }

    #[test]
    fn test_reblock_extends_expiry() {
        let (list, clock) = blocklist();
        list.block("ip", HOUR);
        clock.advance(Duration::from_secs(1800));
        let extended = list.block("ip", HOUR);
        assert_eq!(list.blocked_until("ip"), Some(extended));

        clock.advance(Duration::from_secs(1801));
        assert!(list.is_blocked("ip"));
    }

    #[test]
    fn test_huge_duration_is_clamped() {
        let (list, clock) = blocklist();
        let expires_at = list.block("10.0.0.9", Duration::MAX);
        assert_eq!(expires_at, clock.now() + MAX_BLOCK_DURATION);
        assert!(list.is_blocked("10.0.0.9"));

        list.block("10.0.0.10", Duration::from_secs(u64::MAX));
        assert!(list.is_blocked("10.0.0.10"));
        assert_eq!(list.entries().len(), 2);
    }

    #[test]
    fn test_unblock() {
        let (list, clock) = blocklist();
        list.block("a", HOUR);
        assert!(list.unblock("a"));
        assert!(!list.is_blocked("a"));
        assert!(!list.unblock("a"));

        list.block("b", Duration::from_secs(1));
        clock.advance(Duration::from_secs(2));
        assert!(!list.unblock("b"), "lapsed block is not reported as lifted");
    }

    #[test]
    fn test_entries_and_sweep() {
        let (list, clock) = blocklist();
        list.block("late", HOUR);
        list.block("soon", Duration::from_secs(10));
        list.block("gone", Duration::from_secs(1));
        clock.advance(Duration::from_secs(5));

        let ips: Vec<_> = list.entries().into_iter().map(|e| e.ip).collect();
        assert_eq!(ips, vec!["soon".to_string(), "late".to_string()]);

        assert_eq!(list.len(), 3);
        assert_eq!(list.sweep(), 1);
        assert_eq!(list.len(), 2);
    }
}

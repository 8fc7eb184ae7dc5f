//! Recently verified tokens.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use dashmap::DashMap;

use crate::auth::UserIdentity;
use crate::clock::{elapsed_between, Clock};

#[derive(Debug, Clone)]
struct CachedIdentity {
    identity: UserIdentity,
    cached_at: SystemTime,
}

/// Maps a raw bearer token to the identity it resolved to.
///
/// An entry is served only while `now - cached_at < ttl`. Stale entries read
/// as misses and are dropped on the way out.
#[derive(Debug)]
pub struct TokenCache {
    entries: DashMap<String, CachedIdentity>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, token: &str) -> Option<UserIdentity> {
        let now = self.clock.now();
        if let Some(entry) = self.entries.get(token) {
            if elapsed_between(entry.cached_at, now) < self.ttl {
                return Some(entry.identity.clone());
            }
        }
        self.entries
            .remove_if(token, |_, entry| elapsed_between(entry.cached_at, now) >= self.ttl);
        None
    }

    pub fn insert(&self, token: &str, identity: UserIdentity) {
        self.entries.insert(
            token.to_string(),
            CachedIdentity {
                identity,
                cached_at: self.clock.now(),
            },
        );
    }

    /// Drop one token. Returns whether it was cached.
    pub fn invalidate(&self, token: &str) -> bool {
        self.entries.remove(token).is_some()
    }

    /// Drop every token that resolved to `subject`. Returns how many went.
    pub fn invalidate_subject(&self, subject: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.identity.id != subject);
        before.saturating_sub(self.entries.len())
    }

    /// Remove stale entries. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| elapsed_between(entry.cached_at, now) < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

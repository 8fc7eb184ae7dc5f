//! Periodic eviction of expired pipeline state.
//!
//! Every lookup already treats expired state as absent; sweeping only bounds
//! memory and never changes a decision.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::auth::TokenCache;
use crate::security::blocklist::ViolationBlocklist;
use crate::security::rate_limit::FixedWindowCounter;

/// Entries removed by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub windows: usize,
    pub blocks: usize,
    pub tokens: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.windows + self.blocks + self.tokens
    }
}

pub struct Sweeper {
    limiters: Vec<Arc<FixedWindowCounter>>,
    blocklist: Arc<ViolationBlocklist>,
    token_cache: Arc<TokenCache>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(
        limiters: Vec<Arc<FixedWindowCounter>>,
        blocklist: Arc<ViolationBlocklist>,
        token_cache: Arc<TokenCache>,
        interval: Duration,
    ) -> Self {
        Self {
            limiters,
            blocklist,
            token_cache,
            interval,
        }
    }

    pub fn sweep_once(&self) -> SweepReport {
        SweepReport {
            windows: self.limiters.iter().map(|l| l.sweep()).sum(),
            blocks: self.blocklist.sweep(),
            tokens: self.token_cache.sweep(),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "State sweeper starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.sweep_once();
                    if report.total() > 0 {
                        tracing::debug!(
                            windows = report.windows,
                            blocks = report.blocks,
                            tokens = report.tokens,
                            "Swept expired state"
                        );
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("State sweeper stopping");
                    break;
                }
            }
        }
    }
}

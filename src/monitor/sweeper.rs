//! Expiry Sweeper
//!
//! Periodically deletes pending verification requests older than the verification
//! window from the record store. The in-memory monitoring timeout governs active
//! chain monitoring; the sweep keeps the store clean even when that in-memory state
//! was lost, e.g. across a restart.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::storage::WalletStore;

pub struct ExpirySweeper {
    store: Arc<WalletStore>,
    max_age: Duration,
    interval: Duration,
}

impl ExpirySweeper {
    /// # Arguments
    ///
    /// * `store` - Record store to sweep
    /// * `max_age` - Pending requests older than this are deleted
    /// * `interval` - Period between sweeps
    pub fn new(store: Arc<WalletStore>, max_age: Duration, interval: Duration) -> Self {
        Self {
            store,
            max_age,
            interval,
        }
    }

    /// Deletes every pending request older than `max_age`.
    ///
    /// # Returns
    ///
    /// Number of deleted requests
    pub async fn sweep(&self, max_age: Duration) -> usize {
        self.store.cleanup_expired_pending(max_age).await
    }

    /// Sweeps every `interval` until the task is dropped.
    pub async fn run(self) {
        info!(
            "Starting expiry sweeper (every {:?}, max age {:?})",
            self.interval, self.max_age
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so the first sweep runs one period in.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match self.sweep(self.max_age).await {
                0 => debug!("Expiry sweep found nothing to clean up"),
                count => info!("Cleaned up {} expired pending wallet verifications", count),
            }
        }
    }
}

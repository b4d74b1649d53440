//! Verification Reconciler
//!
//! Drives the block scanner and the matcher over the monitoring set. One loop runs
//! per `Idle -> Running` transition of the set; it exits once the set is empty or a
//! newer loop has replaced it.
//!
//! Each loop starts with an unset cursor: the first cycle pins the cursor to the
//! current tip without scanning, so payments made before monitoring started are
//! never matched. Later cycles scan every height after the cursor up to the tip,
//! matching blocks strictly in height order, and advance the cursor only past
//! blocks that were fetched and matched. A failed RPC call ends the cycle; the
//! loop retries with capped exponential backoff.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use super::backoff::Backoff;
use super::generic::VerificationEvent;
use super::matcher::PaymentMatcher;
use super::scanner::{next_range, BlockScanner};
use super::watchlist::{AddOutcome, LoopState, MonitoringSet};
use crate::config::{Config, MonitorConfig};
use crate::evm_client::{EvmClient, RpcError};

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Loop timing and limits.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Wait after a successful cycle that caught up with the tip
    pub polling_interval: Duration,
    /// First retry delay after a failed cycle
    pub retry_initial_backoff: Duration,
    /// Cap of the retry delay
    pub retry_max_backoff: Duration,
    /// Maximum heights scanned per cycle
    pub max_blocks_per_cycle: u64,
}

impl From<&MonitorConfig> for ReconcilerSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            polling_interval: Duration::from_millis(config.polling_interval_ms),
            retry_initial_backoff: Duration::from_millis(config.retry_initial_backoff_ms),
            retry_max_backoff: Duration::from_millis(config.retry_max_backoff_ms),
            max_blocks_per_cycle: config.max_blocks_per_cycle,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The cursor was unset and is now pinned to the tip; nothing was scanned.
    CursorInitialized { height: u64 },
    /// The tip has not moved past the cursor.
    NoNewBlocks { latest: u64 },
    /// Heights `from..=to` were scanned and `events` verification events emitted.
    Scanned {
        from: u64,
        to: u64,
        events: usize,
        caught_up: bool,
    },
}

/// Snapshot of the reconciler for status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcilerStatus {
    pub state: LoopState,
    pub monitored: usize,
    pub generation: u64,
    pub last_checked_block: Option<u64>,
}

#[derive(Debug, Default)]
struct PublishedCursor {
    generation: u64,
    last_checked: Option<u64>,
}

// ============================================================================
// RECONCILER IMPLEMENTATION
// ============================================================================

/// Owns the monitoring set and starts/stops the block-polling loop with it.
///
/// Cloning is cheap; clones share the set, the event channel and the cursor.
#[derive(Debug, Clone)]
pub struct Reconciler {
    scanner: BlockScanner,
    matcher: PaymentMatcher,
    watchlist: Arc<MonitoringSet>,
    events: mpsc::UnboundedSender<VerificationEvent>,
    settings: ReconcilerSettings,
    cursor: Arc<RwLock<PublishedCursor>>,
}

impl Reconciler {
    /// Builds a reconciler from the service configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - Service configuration
    /// * `events` - Sender half of the verification event channel
    pub fn new(config: &Config, events: mpsc::UnboundedSender<VerificationEvent>) -> anyhow::Result<Self> {
        let client = EvmClient::new(
            &config.chain.rpc_url,
            Duration::from_millis(config.chain.rpc_timeout_ms),
        )?;
        let scanner = BlockScanner::new(client, config.monitor.max_concurrent_fetches);
        let matcher = PaymentMatcher::new(
            &config.verification.collection_address,
            config.verification.expected_amount_wei()?,
            config.verification.tolerance_wei()?,
            config.verification.decimals,
        );
        Ok(Self::from_parts(
            scanner,
            matcher,
            ReconcilerSettings::from(&config.monitor),
            events,
        ))
    }

    pub fn from_parts(
        scanner: BlockScanner,
        matcher: PaymentMatcher,
        settings: ReconcilerSettings,
        events: mpsc::UnboundedSender<VerificationEvent>,
    ) -> Self {
        Self {
            scanner,
            matcher,
            watchlist: Arc::new(MonitoringSet::new()),
            events,
            settings,
            cursor: Arc::new(RwLock::new(PublishedCursor::default())),
        }
    }

    /// Registers an address for verification and starts the loop if it was idle.
    ///
    /// # Arguments
    ///
    /// * `address` - Wallet address expected to send the payment
    /// * `timeout` - How long to keep the address monitored
    pub async fn start_monitoring(&self, address: &str, timeout: Duration) -> AddOutcome {
        let outcome = self.watchlist.add(address, timeout).await;
        self.spawn_loop_if_started(outcome);
        outcome
    }

    /// Like [`Reconciler::start_monitoring`], but restarts the window of an address
    /// that is already monitored. The running loop and its cursor are kept.
    pub async fn renew_monitoring(&self, address: &str, timeout: Duration) -> AddOutcome {
        let outcome = self.watchlist.renew(address, timeout).await;
        self.spawn_loop_if_started(outcome);
        outcome
    }

    fn spawn_loop_if_started(&self, outcome: AddOutcome) {
        if let AddOutcome::Added {
            start_loop: Some(generation),
            ..
        } = outcome
        {
            let reconciler = self.clone();
            tokio::spawn(async move { reconciler.run_loop(generation).await });
        }
    }

    /// Stops monitoring an address without a verification outcome.
    pub async fn stop_monitoring(&self, address: &str) -> bool {
        self.watchlist.remove(address).await
    }

    pub fn watchlist(&self) -> &Arc<MonitoringSet> {
        &self.watchlist
    }

    pub fn matcher(&self) -> &PaymentMatcher {
        &self.matcher
    }

    pub async fn status(&self) -> ReconcilerStatus {
        let state = self.watchlist.state().await;
        let generation = self.watchlist.generation().await;
        let monitored = self.watchlist.len().await;
        let cursor = self.cursor.read().await;
        let last_checked_block = if state == LoopState::Running && cursor.generation == generation {
            cursor.last_checked
        } else {
            None
        };
        ReconcilerStatus {
            state,
            monitored,
            generation,
            last_checked_block,
        }
    }

    async fn publish_cursor(&self, generation: u64, last_checked: Option<u64>) {
        let mut cursor = self.cursor.write().await;
        if generation >= cursor.generation {
            cursor.generation = generation;
            cursor.last_checked = last_checked;
        }
    }

    /// Loop body for `generation`; returns once the set is empty or the loop is superseded.
    async fn run_loop(self, generation: u64) {
        info!("Blockchain monitoring started (loop {})", generation);
        let mut cursor: Option<u64> = None;
        self.publish_cursor(generation, None).await;
        let mut backoff = Backoff::new(
            self.settings.retry_initial_backoff,
            self.settings.retry_max_backoff,
        );

        loop {
            if self.watchlist.finish_if_empty(generation).await {
                break;
            }

            let delay = match self.run_cycle(generation, &mut cursor).await {
                Ok(CycleOutcome::Scanned {
                    caught_up: false, ..
                }) => {
                    backoff.reset();
                    Duration::ZERO
                }
                Ok(outcome) => {
                    debug!("Monitoring cycle finished: {:?}", outcome);
                    backoff.reset();
                    self.settings.polling_interval
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!("Monitoring cycle failed, retrying in {:?}: {}", delay, e);
                    delay
                }
            };

            if self.watchlist.finish_if_empty(generation).await {
                break;
            }
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
        }

        info!("Blockchain monitoring stopped (loop {})", generation);
    }

    /// Runs one cycle of loop `generation` against `cursor`.
    ///
    /// On error the cursor holds the last height that was fully processed.
    pub async fn run_cycle(
        &self,
        generation: u64,
        cursor: &mut Option<u64>,
    ) -> Result<CycleOutcome, RpcError> {
        let latest = self.scanner.latest_height().await?;

        let Some(last_checked) = *cursor else {
            *cursor = Some(latest);
            self.publish_cursor(generation, *cursor).await;
            info!("Monitoring from block {}", latest);
            return Ok(CycleOutcome::CursorInitialized { height: latest });
        };

        let Some(range) = next_range(last_checked, latest, self.settings.max_blocks_per_cycle) else {
            return Ok(CycleOutcome::NoNewBlocks { latest });
        };
        let (from, to) = (*range.start(), *range.end());
        debug!("Scanning blocks {}..={} (tip {})", from, to, latest);

        let mut emitted = 0;
        let mut blocks = Box::pin(self.scanner.fetch_range(range));
        while let Some((height, result)) = blocks.next().await {
            let block = match result {
                Ok(block) => block,
                Err(e) => {
                    warn!("Failed to fetch block {}, cursor stays at {:?}", height, cursor);
                    return Err(e);
                }
            };

            let monitored = self.watchlist.snapshot().await;
            for event in self.matcher.match_block(&block, height, &monitored) {
                if self.watchlist.claim(&event.from_address, generation).await.is_none() {
                    debug!(
                        "Ignoring payment {} from {}: address no longer monitored",
                        event.transaction_hash, event.from_address
                    );
                    continue;
                }
                info!("Wallet verification successful for {}", event.from_address);
                if self.events.send(event).is_err() {
                    error!("Verification event receiver dropped, event lost");
                }
                emitted += 1;
            }

            *cursor = Some(height);
            self.publish_cursor(generation, *cursor).await;
        }

        Ok(CycleOutcome::Scanned {
            from,
            to,
            events: emitted,
            caught_up: to == latest,
        })
    }
}

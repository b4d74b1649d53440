//! Monitoring Set
//!
//! In-memory registry of wallet addresses currently awaited for a verification
//! payment. The set also owns the reconciler loop state, so that "the loop runs iff
//! the set is non-empty" is decided under the same lock that mutates the entries.
//!
//! Every mutation and the loop's snapshot read go through one `RwLock`; no lock is
//! held across an RPC call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::generic::normalize_address;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Reconciler loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Idle,
    Running,
}

/// An address awaiting its verification payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoredAddress {
    /// Normalized lowercase address
    pub address: String,
    /// When monitoring started
    pub start_time: DateTime<Utc>,
    /// How long the address stays monitored
    pub timeout_ms: u64,
    /// Identifies this monitoring episode of the address
    pub episode: u64,
}

/// Result of [`MonitoringSet::add`] and [`MonitoringSet::renew`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The address was already monitored; nothing changed.
    AlreadyMonitored,
    /// The address was added. `start_loop` carries the generation of a loop the
    /// caller must start, set only when this add moved the set from `Idle` to
    /// `Running`.
    Added {
        episode: u64,
        start_loop: Option<u64>,
    },
    /// The address was present; its window restarted under a new episode.
    Renewed { episode: u64 },
}

#[derive(Debug)]
struct Inner {
    entries: HashMap<String, MonitoredAddress>,
    state: LoopState,
    generation: u64,
    next_episode: u64,
}

impl Inner {
    /// Inserts a new episode of `address`; moves the loop from `Idle` to `Running`.
    fn insert_entry(&mut self, address: &str, timeout: Duration) -> AddOutcome {
        self.next_episode += 1;
        let episode = self.next_episode;
        self.entries.insert(
            address.to_string(),
            MonitoredAddress {
                address: address.to_string(),
                start_time: Utc::now(),
                timeout_ms: timeout.as_millis() as u64,
                episode,
            },
        );

        let start_loop = if self.state == LoopState::Idle {
            self.state = LoopState::Running;
            self.generation += 1;
            Some(self.generation)
        } else {
            None
        };

        AddOutcome::Added { episode, start_loop }
    }

    /// Removes an entry; moves the loop to `Idle` when the set empties.
    fn remove_entry(&mut self, address: &str) -> Option<MonitoredAddress> {
        let removed = self.entries.remove(address);
        if removed.is_some() && self.entries.is_empty() && self.state == LoopState::Running {
            self.state = LoopState::Idle;
            debug!("Monitoring set empty, loop generation {} stopping", self.generation);
        }
        removed
    }
}

// ============================================================================
// MONITORING SET IMPLEMENTATION
// ============================================================================

/// Registry of monitored addresses plus the reconciler loop state.
#[derive(Debug)]
pub struct MonitoringSet {
    inner: RwLock<Inner>,
}

impl MonitoringSet {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                state: LoopState::Idle,
                generation: 0,
                next_episode: 0,
            }),
        }
    }

    /// Starts monitoring an address.
    ///
    /// Idempotent while the address is present. A fresh entry schedules its own
    /// expiry task that removes the entry after `timeout` regardless of loop state.
    ///
    /// # Arguments
    ///
    /// * `address` - Wallet address (any case)
    /// * `timeout` - How long to wait for the payment
    ///
    /// # Returns
    ///
    /// Whether the address was added and whether a new loop must be started
    pub async fn add(self: &Arc<Self>, address: &str, timeout: Duration) -> AddOutcome {
        let address = normalize_address(address);

        let outcome = {
            let mut inner = self.inner.write().await;
            if inner.entries.contains_key(&address) {
                return AddOutcome::AlreadyMonitored;
            }
            inner.insert_entry(&address, timeout)
        };

        if let AddOutcome::Added { episode, .. } = outcome {
            info!("Monitoring wallet {} for verification ({} ms)", address, timeout.as_millis());
            self.schedule_expiry(address, episode, timeout);
        }

        outcome
    }

    /// Starts or extends monitoring of an address with a fresh window.
    ///
    /// A present entry gets a new episode and start time in place, so the set never
    /// empties and the running loop keeps its cursor. The superseded expiry timer
    /// becomes a no-op. An absent address is added as by [`MonitoringSet::add`].
    ///
    /// # Arguments
    ///
    /// * `address` - Wallet address (any case)
    /// * `timeout` - Length of the new window
    pub async fn renew(self: &Arc<Self>, address: &str, timeout: Duration) -> AddOutcome {
        let address = normalize_address(address);

        let outcome = {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;
            match inner.entries.get_mut(&address) {
                Some(entry) => {
                    inner.next_episode += 1;
                    let episode = inner.next_episode;
                    entry.start_time = Utc::now();
                    entry.timeout_ms = timeout.as_millis() as u64;
                    entry.episode = episode;
                    AddOutcome::Renewed { episode }
                }
                None => inner.insert_entry(&address, timeout),
            }
        };

        match outcome {
            AddOutcome::Renewed { episode } => {
                info!("Monitoring window of wallet {} renewed ({} ms)", address, timeout.as_millis());
                self.schedule_expiry(address, episode, timeout);
            }
            AddOutcome::Added { episode, .. } => {
                info!("Monitoring wallet {} for verification ({} ms)", address, timeout.as_millis());
                self.schedule_expiry(address, episode, timeout);
            }
            AddOutcome::AlreadyMonitored => {}
        }

        outcome
    }

    fn schedule_expiry(self: &Arc<Self>, address: String, episode: u64, timeout: Duration) {
        let set = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            set.expire(&address, episode).await;
        });
    }

    /// Removes the entry of `episode` if it is still present.
    async fn expire(&self, address: &str, episode: u64) -> bool {
        let mut inner = self.inner.write().await;
        let same_episode = inner
            .entries
            .get(address)
            .map(|entry| entry.episode == episode)
            .unwrap_or(false);
        if !same_episode {
            return false;
        }
        inner.remove_entry(address);
        info!("Verification timed out for wallet {}", address);
        true
    }

    /// Stops monitoring an address. Removing an absent address is a no-op.
    ///
    /// # Returns
    ///
    /// `true` if the address was present
    pub async fn remove(&self, address: &str) -> bool {
        let address = normalize_address(address);
        let mut inner = self.inner.write().await;
        inner.remove_entry(&address).is_some()
    }

    /// Atomically removes `address` on behalf of loop `generation`.
    ///
    /// Succeeds only if the address is still monitored and the loop is still the
    /// current one. Whichever of claim, expiry or remove runs first wins the address.
    pub async fn claim(&self, address: &str, generation: u64) -> Option<MonitoredAddress> {
        let address = normalize_address(address);
        let mut inner = self.inner.write().await;
        if inner.state != LoopState::Running || inner.generation != generation {
            return None;
        }
        inner.remove_entry(&address)
    }

    pub async fn has(&self, address: &str) -> bool {
        let address = normalize_address(address);
        self.inner.read().await.entries.contains_key(&address)
    }

    pub async fn get(&self, address: &str) -> Option<MonitoredAddress> {
        let address = normalize_address(address);
        self.inner.read().await.entries.get(&address).cloned()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    /// Copy of the currently monitored addresses.
    pub async fn snapshot(&self) -> HashSet<String> {
        self.inner.read().await.entries.keys().cloned().collect()
    }

    pub async fn state(&self) -> LoopState {
        self.inner.read().await.state
    }

    /// Generation of the most recently started loop.
    pub async fn generation(&self) -> u64 {
        self.inner.read().await.generation
    }

    /// Called by loop `generation` at cycle boundaries.
    ///
    /// Moves the set to `Idle` if it is empty and returns `true` when the loop
    /// must exit (set empty, or the loop has been superseded).
    pub async fn finish_if_empty(&self, generation: u64) -> bool {
        let mut inner = self.inner.write().await;
        if inner.state != LoopState::Running || inner.generation != generation {
            return true;
        }
        if inner.entries.is_empty() {
            inner.state = LoopState::Idle;
            return true;
        }
        false
    }
}

impl Default for MonitoringSet {
    fn default() -> Self {
        Self::new()
    }
}

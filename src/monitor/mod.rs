//! Payment Monitoring Module
//!
//! This module watches the chain for verification payments: the monitoring set of
//! awaited wallets, the block scanner, the transaction matcher, the reconciler loop
//! that ties them together, and the sweeper that retires stale pending requests.

// Shared event structure and address helpers
mod generic;

mod backoff;
pub mod matcher;
pub mod reconciler;
pub mod scanner;
pub mod sweeper;
pub mod watchlist;

// Re-export for convenience
pub use backoff::Backoff;
pub use generic::{format_wallet_address, is_valid_wallet_address, normalize_address, VerificationEvent};
pub use matcher::PaymentMatcher;
pub use reconciler::{CycleOutcome, Reconciler, ReconcilerSettings, ReconcilerStatus};
pub use scanner::{next_range, BlockScanner};
pub use sweeper::ExpirySweeper;
pub use watchlist::{AddOutcome, LoopState, MonitoredAddress, MonitoringSet};

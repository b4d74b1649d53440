//! Shared monitor structures and address helpers
//!
//! This module contains the event emitted when a verification payment is observed
//! and the address helpers used by every component that stores or compares wallet
//! addresses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Normalizes a wallet address for storage and comparison (trimmed, lowercase).
///
/// Matching is case-insensitive, so checksummed (mixed-case) addresses and their
/// lowercase form refer to the same entry.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Checks that an address is an Ethereum-compatible account address:
/// `0x` followed by exactly 40 hex characters.
pub fn is_valid_wallet_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(hex_part) => hex_part.len() == 40 && hex::decode(hex_part).is_ok(),
        None => false,
    }
}

/// Shortens an address for log lines and status output (`0x5571...a6ae`).
pub fn format_wallet_address(address: &str) -> String {
    if address.len() < 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

// ============================================================================
// EVENT DATA STRUCTURES
// ============================================================================

/// A verification payment observed on-chain.
///
/// Produced by the matcher, honored by the reconciler only if it still owned the
/// address at the moment of removal, and consumed exactly once by the verification
/// service, which moves the pending record to verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationEvent {
    /// Sender of the payment (normalized lowercase)
    pub from_address: String,
    /// Paid amount in the chain's smallest unit
    pub amount_wei: u128,
    /// Paid amount in display units (e.g. "0.01")
    pub amount: String,
    /// Hash of the payment transaction
    pub transaction_hash: String,
    /// Height of the block containing the payment
    pub block_number: u64,
    /// When the reconciler observed the payment
    pub observed_at: DateTime<Utc>,
}

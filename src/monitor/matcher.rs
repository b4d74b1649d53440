//! Transaction Matcher
//!
//! Finds verification payments in a block: a transaction qualifies when its sender
//! is monitored, its recipient is the collection address (both case-insensitive)
//! and its value is within the tolerance of the expected amount. No other field
//! influences matching.

use chrono::Utc;
use std::collections::HashSet;
use tracing::{debug, info};

use super::generic::{normalize_address, VerificationEvent};
use crate::evm_client::EvmBlock;
use crate::units::{format_units, parse_hex_quantity};

/// Payment terms compared against every transaction.
#[derive(Debug, Clone)]
pub struct PaymentMatcher {
    /// Normalized collection address
    collection_address: String,
    /// Expected payment in smallest units
    expected_wei: u128,
    /// Accepted deviation in smallest units (strict upper bound)
    tolerance_wei: u128,
    /// Decimals used to render the matched amount
    decimals: u32,
}

impl PaymentMatcher {
    pub fn new(collection_address: &str, expected_wei: u128, tolerance_wei: u128, decimals: u32) -> Self {
        Self {
            collection_address: normalize_address(collection_address),
            expected_wei,
            tolerance_wei,
            decimals,
        }
    }

    pub fn collection_address(&self) -> &str {
        &self.collection_address
    }

    pub fn expected_wei(&self) -> u128 {
        self.expected_wei
    }

    /// `|value - expected| < tolerance`, computed on integers.
    pub fn amount_matches(&self, value_wei: u128) -> bool {
        value_wei.abs_diff(self.expected_wei) < self.tolerance_wei
    }

    /// Returns one event per qualifying transaction of `block`.
    ///
    /// Several qualifying transactions, even from the same sender, each produce an
    /// event; the reconciler honors at most one per address.
    ///
    /// # Arguments
    ///
    /// * `block` - Block fetched with full transactions
    /// * `block_number` - Height the block was fetched at
    /// * `monitored` - Normalized addresses currently awaited
    pub fn match_block(
        &self,
        block: &EvmBlock,
        block_number: u64,
        monitored: &HashSet<String>,
    ) -> Vec<VerificationEvent> {
        let mut events = Vec::new();

        for tx in &block.transactions {
            let from = normalize_address(&tx.from);
            if !monitored.contains(&from) {
                continue;
            }
            let to_collection = tx
                .to
                .as_deref()
                .map(|to| normalize_address(to) == self.collection_address)
                .unwrap_or(false);
            if !to_collection {
                continue;
            }

            let value_wei = match parse_hex_quantity(&tx.value) {
                Ok(value) => value,
                Err(e) => {
                    debug!("Skipping transaction {} with unreadable value '{}': {}", tx.hash, tx.value, e);
                    continue;
                }
            };

            if !self.amount_matches(value_wei) {
                debug!(
                    "Transaction {} from {} paid {} (expected {}), not a verification payment",
                    tx.hash,
                    from,
                    format_units(value_wei, self.decimals),
                    format_units(self.expected_wei, self.decimals)
                );
                continue;
            }

            info!("Verification payment found: {} from {} in block {}", tx.hash, from, block_number);
            events.push(VerificationEvent {
                from_address: from,
                amount_wei: value_wei,
                amount: format_units(value_wei, self.decimals),
                transaction_hash: tx.hash.clone(),
                block_number,
                observed_at: Utc::now(),
            });
        }

        events
    }
}

//! Block Scanner
//!
//! Queries the chain tip and fetches blocks by height. Heights are dense, so the
//! reconciler's cursor plus [`next_range`] guarantees every height between the last
//! processed block and the tip is eventually fetched, however irregular the polling.

use futures::stream::{self, Stream, StreamExt};
use std::ops::RangeInclusive;

use crate::evm_client::{EvmBlock, EvmClient, RpcError};

/// Heights to scan after `last_checked`, capped at `max_blocks` per cycle.
///
/// Returns `None` when the tip has not moved past the cursor.
pub fn next_range(last_checked: u64, latest: u64, max_blocks: u64) -> Option<RangeInclusive<u64>> {
    if latest <= last_checked || max_blocks == 0 {
        return None;
    }
    let start = last_checked + 1;
    let end = latest.min(last_checked.saturating_add(max_blocks));
    Some(start..=end)
}

/// Reads chain height and blocks through the RPC gateway.
#[derive(Debug, Clone)]
pub struct BlockScanner {
    client: EvmClient,
    max_concurrent_fetches: usize,
}

impl BlockScanner {
    pub fn new(client: EvmClient, max_concurrent_fetches: usize) -> Self {
        Self {
            client,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
        }
    }

    /// Current chain tip.
    pub async fn latest_height(&self) -> Result<u64, RpcError> {
        self.client.get_block_number().await
    }

    /// One block with its full transaction list.
    pub async fn fetch_block(&self, height: u64) -> Result<EvmBlock, RpcError> {
        self.client.get_block_by_number(height).await
    }

    /// Fetches every height of `range` with bounded concurrency.
    ///
    /// Items are yielded in ascending height order regardless of which fetch
    /// completes first. Dropping the stream cancels the fetches still in flight.
    pub fn fetch_range(
        &self,
        range: RangeInclusive<u64>,
    ) -> impl Stream<Item = (u64, Result<EvmBlock, RpcError>)> + '_ {
        stream::iter(range)
            .map(move |height| async move { (height, self.fetch_block(height).await) })
            .buffered(self.max_concurrent_fetches)
    }

    pub fn client(&self) -> &EvmClient {
        &self.client
    }
}

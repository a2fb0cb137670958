use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use crawler_primitives::FullBlock;

use crate::{error::NodeProviderError, types::{BlockStats, MempoolTransaction}};

/// The node-facing RPC surface (spec §6.2). Every method is subject to
/// the provider's rate limits (`maxConcurrentRequests`, `maxBatchSize`,
/// `requestDelayMs`, `responseTimeout`); implementers own that
/// enforcement, callers just see a plain async call.
#[async_trait]
pub trait NodeProvider: Send + Sync {
    async fn get_current_block_height_from_network(&self) -> Result<u64, NodeProviderError>;

    async fn get_current_block_height_from_mempool(&self) -> Result<u64, NodeProviderError>;

    async fn get_many_blocks_stats_by_heights(&self, heights: &[u64]) -> Result<Vec<BlockStats>, NodeProviderError>;

    async fn get_many_blocks_by_heights(&self, heights: &[u64]) -> Result<Vec<FullBlock>, NodeProviderError>;

    async fn get_many_blocks_by_hashes(&self, hashes: &[BlockHash]) -> Result<Vec<FullBlock>, NodeProviderError>;

    async fn get_block_hash_at_height(&self, height: u64) -> Result<BlockHash, NodeProviderError>;

    async fn list_mempool_txids(&self) -> Result<Vec<Txid>, NodeProviderError>;

    async fn get_mempool_transactions_verbose(
        &self,
        txids: &[Txid],
    ) -> Result<Vec<MempoolTransaction>, NodeProviderError>;
}

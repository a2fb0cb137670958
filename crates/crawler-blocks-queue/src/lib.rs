//! Loader + iterator cooperating tasks over a byte-bounded block queue
//! (spec §4.4). The loader task runs ahead of consumption per a pluggable
//! [`LoaderStrategy`]; the [`BlocksQueueHandle`] is how a consumer (the
//! pipeline) dequeues contiguous batches and confirms them once
//! processed.

mod backoff;
mod config;
mod handle;
mod loader;
mod state;
mod strategy;

use std::sync::Arc;

use crawler_node_provider::NodeProvider;
use tokio::sync::{watch, Mutex, Notify};

pub use backoff::Backoff;
pub use config::BlocksQueueConfig;
pub use handle::{BlocksQueueHandle, ReservedBatch};
pub use state::QueuePhase;
pub use strategy::{LoaderStrategy, PullNetwork, Sequential};

/// Builds the shared queue state and returns `(handle, task)`: spawn
/// the task (`tokio::spawn(task)`) and keep the handle to drive the
/// iterator side and signal shutdown. Mirrors
/// `alpen_ee_sequencer::batch_builder::handle::create_batch_builder`'s
/// builder-returns-`(handle, future)` idiom.
pub fn create_blocks_queue(
    config: BlocksQueueConfig,
    node: Arc<dyn NodeProvider>,
) -> (BlocksQueueHandle, impl std::future::Future<Output = ()>) {
    let state = Arc::new(Mutex::new(state::QueueState::new(config.initial_height, config.max_queue_size_bytes)));
    let wake_loader = Arc::new(Notify::new());
    let (phase_tx, phase_rx) = watch::channel(QueuePhase::Idle);
    let phase_tx = Arc::new(phase_tx);
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);

    let handle = BlocksQueueHandle {
        state: state.clone(),
        wake_loader: wake_loader.clone(),
        phase_tx: phase_tx.clone(),
        phase_rx,
        stop_tx,
    };

    let task = loader::run(state, wake_loader, phase_tx, stop_rx, node, config);

    (handle, task)
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use bitcoin::{blockdata::constants::genesis_block, hashes::Hash, BlockHash, Network, Txid};
    use crawler_node_provider::{BlockStats, MempoolTransaction, NodeProvider, NodeProviderError};
    use crawler_primitives::FullBlock;

    use super::*;

    /// A fixed-tip provider that always serves the regtest genesis
    /// block content regardless of requested height, enough to drive
    /// the loader/handle contract without a real node.
    struct FixedTipProvider {
        tip: u64,
    }

    #[async_trait]
    impl NodeProvider for FixedTipProvider {
        async fn get_current_block_height_from_network(&self) -> Result<u64, NodeProviderError> {
            Ok(self.tip)
        }

        async fn get_current_block_height_from_mempool(&self) -> Result<u64, NodeProviderError> {
            Ok(self.tip)
        }

        async fn get_many_blocks_stats_by_heights(&self, heights: &[u64]) -> Result<Vec<BlockStats>, NodeProviderError> {
            Ok(heights
                .iter()
                .map(|&height| BlockStats { height, blockhash: BlockHash::all_zeros(), total_size: 0 })
                .collect())
        }

        async fn get_many_blocks_by_heights(&self, heights: &[u64]) -> Result<Vec<FullBlock>, NodeProviderError> {
            Ok(heights.iter().map(|&height| FullBlock::new(height, genesis_block(Network::Regtest))).collect())
        }

        async fn get_many_blocks_by_hashes(&self, _hashes: &[BlockHash]) -> Result<Vec<FullBlock>, NodeProviderError> {
            Ok(Vec::new())
        }

        async fn get_block_hash_at_height(&self, _height: u64) -> Result<BlockHash, NodeProviderError> {
            Ok(genesis_block(Network::Regtest).block_hash())
        }

        async fn list_mempool_txids(&self) -> Result<Vec<Txid>, NodeProviderError> {
            Ok(Vec::new())
        }

        async fn get_mempool_transactions_verbose(&self, _txids: &[Txid]) -> Result<Vec<MempoolTransaction>, NodeProviderError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn loader_fills_the_queue_up_to_the_node_tip() {
        let node: Arc<dyn NodeProvider> = Arc::new(FixedTipProvider { tip: 5 });
        let mut config = BlocksQueueConfig::new(0, Arc::new(PullNetwork));
        config.loader_request_batch_size = 2;
        let (handle, task) = create_blocks_queue(config, node);
        let join = tokio::spawn(task);

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let batch = handle.next_batch(8).await;
                if !batch.blocks.is_empty() {
                    assert_eq!(batch.blocks.first().unwrap().height, 0);
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("loader should have produced a batch");

        handle.stop();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn confirm_frees_capacity_for_the_loader_to_continue() {
        let node: Arc<dyn NodeProvider> = Arc::new(FixedTipProvider { tip: 100 });
        let mut config = BlocksQueueConfig::new(0, Arc::new(Sequential));
        config.max_queue_size_bytes = 300;
        config.loader_request_batch_size = 1;
        let (handle, task) = create_blocks_queue(config, node);
        let join = tokio::spawn(task);

        let batch = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let batch = handle.next_batch(1).await;
                if !batch.blocks.is_empty() {
                    return batch;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let hash = batch.blocks[0].block_hash();
        handle.confirm_processed_batch(&[hash]).await;

        handle.stop();
        join.await.unwrap();
    }

    #[tokio::test]
    async fn reset_discards_queued_work_past_the_new_tip() {
        let node: Arc<dyn NodeProvider> = Arc::new(FixedTipProvider { tip: 100 });
        let config = BlocksQueueConfig::new(0, Arc::new(Sequential));
        let (handle, task) = create_blocks_queue(config, node);
        let join = tokio::spawn(task);

        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.reset(0).await;
        assert_eq!(handle.phase(), QueuePhase::Running);

        handle.stop();
        join.await.unwrap();
    }
}

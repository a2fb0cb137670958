//! `AddBlocksBatch` orchestration (spec §4.5): the network aggregate,
//! every registered user model, and the optional mempool aggregate all
//! see the same batch of blocks in lockstep, committed to the event
//! store atomically or rolled back together on a reorg.

mod batch;
mod config;
mod error;
mod handle;
mod reorg;
mod registry;
mod state;
mod task;

use std::sync::Arc;

pub use batch::{process_batch, BatchOutcome};
pub use config::PipelineConfig;
pub use error::PipelineError;
pub use handle::PipelineHandle;
pub use registry::ModelEntry;
pub use state::PipelineState;

use crawler_blocks_queue::BlocksQueueHandle;
use crawler_event_store::EventStore;
use crawler_node_provider::NodeProvider;
use tokio::sync::watch;

/// Wires a [`PipelineState`] to a blocks queue and returns a handle
/// plus the task future to spawn, mirroring
/// `crawler_blocks_queue::create_blocks_queue`'s builder shape.
/// `mempool_node` is only consulted when `config.mempool_sync_interval`
/// is set and `state.mempool` is `Some`; pass `None` otherwise.
pub fn create_pipeline(
    state: PipelineState,
    node: Arc<dyn NodeProvider>,
    mempool_node: Option<Arc<dyn NodeProvider>>,
    event_store: Arc<dyn EventStore>,
    queue: BlocksQueueHandle,
    config: PipelineConfig,
) -> (PipelineHandle, impl std::future::Future<Output = ()>) {
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    let handle = PipelineHandle { stop_tx };
    let task = task::run(state, node, mempool_node, event_store, queue, config, stop_rx);
    (handle, task)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bitcoin::{blockdata::constants::genesis_block, BlockHash, Network as BtcNetwork, Txid};
    use crawler_aggregate::{Aggregate, AggregateError, AggregateOptions, Event, NO_BLOCK_HEIGHT};
    use crawler_event_store::InMemoryEventStore;
    use crawler_models::{BlockContext, UserModel, UserModelError};
    use crawler_network::NetworkAggregate;
    use crawler_node_provider::{BlockStats, MempoolTransaction, NodeProviderError};
    use crawler_primitives::{FullBlock, Network, NetworkConfig, RequestId};

    use super::*;

    const EVENT_TX_COUNTED: &str = "TxCounted";

    #[derive(Default)]
    struct TxCountModel {
        version: u64,
        last_block_height: i64,
        uncommitted: Vec<Event>,
        total_tx_count: u64,
    }

    impl TxCountModel {
        fn new() -> Self {
            Self { last_block_height: NO_BLOCK_HEIGHT, ..Default::default() }
        }
    }

    impl Aggregate for TxCountModel {
        fn aggregate_id(&self) -> &str {
            "tx-count-model"
        }
        fn version(&self) -> u64 {
            self.version
        }
        fn last_block_height(&self) -> i64 {
            self.last_block_height
        }
        fn uncommitted_events(&self) -> &[Event] {
            &self.uncommitted
        }
        fn handle(&mut self, event: &Event) -> Result<(), AggregateError> {
            match event.event_type.as_str() {
                EVENT_TX_COUNTED => {
                    let count: u64 = serde_json::from_value(event.payload.clone())
                        .map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
                    self.total_tx_count += count;
                    Ok(())
                }
                other => Err(AggregateError::UnknownEventType(other.to_string())),
            }
        }
        fn serialize_user_state(&self) -> Result<Vec<u8>, AggregateError> {
            Ok(self.total_tx_count.to_le_bytes().to_vec())
        }
        fn restore_user_state(&mut self, bytes: &[u8]) -> Result<(), AggregateError> {
            let arr: [u8; 8] = bytes.try_into().map_err(|_| AggregateError::CorruptSnapshot("bad length".into()))?;
            self.total_tx_count = u64::from_le_bytes(arr);
            Ok(())
        }
        fn reset(&mut self) {
            self.version = 0;
            self.last_block_height = NO_BLOCK_HEIGHT;
            self.uncommitted.clear();
            self.total_tx_count = 0;
        }
        fn set_version(&mut self, version: u64) {
            self.version = version;
        }
        fn set_last_block_height(&mut self, height: i64) {
            self.last_block_height = height;
        }
        fn push_uncommitted(&mut self, event: Event) {
            self.uncommitted.push(event);
        }
        fn take_uncommitted(&mut self) -> Vec<Event> {
            std::mem::take(&mut self.uncommitted)
        }
    }

    #[async_trait]
    impl UserModel for TxCountModel {
        async fn process_block(&mut self, ctx: &BlockContext<'_>) -> Result<(), UserModelError> {
            let count = ctx.block.block.txdata.len() as u64;
            self.apply(RequestId::default(), EVENT_TX_COUNTED, ctx.block.height as i64, serde_json::to_value(count).unwrap())?;
            Ok(())
        }
        fn to_json_payload(&self) -> Option<serde_json::Value> {
            Some(serde_json::json!({ "totalTxCount": self.total_tx_count }))
        }
        fn as_aggregate_mut(&mut self) -> &mut dyn Aggregate {
            self
        }
        fn as_aggregate(&self) -> &dyn Aggregate {
            self
        }
    }

    struct FakeNode {
        canonical: Vec<BlockHash>,
    }

    #[async_trait]
    impl crawler_node_provider::NodeProvider for FakeNode {
        async fn get_current_block_height_from_network(&self) -> Result<u64, NodeProviderError> {
            Ok(self.canonical.len() as u64 - 1)
        }
        async fn get_current_block_height_from_mempool(&self) -> Result<u64, NodeProviderError> {
            Ok(0)
        }
        async fn get_many_blocks_stats_by_heights(&self, _heights: &[u64]) -> Result<Vec<BlockStats>, NodeProviderError> {
            Ok(Vec::new())
        }
        async fn get_many_blocks_by_heights(&self, _heights: &[u64]) -> Result<Vec<FullBlock>, NodeProviderError> {
            Ok(Vec::new())
        }
        async fn get_many_blocks_by_hashes(&self, _hashes: &[BlockHash]) -> Result<Vec<FullBlock>, NodeProviderError> {
            Ok(Vec::new())
        }
        async fn get_block_hash_at_height(&self, height: u64) -> Result<BlockHash, NodeProviderError> {
            self.canonical
                .get(height as usize)
                .copied()
                .ok_or_else(|| NodeProviderError::Rpc("height out of range".into()))
        }
        async fn list_mempool_txids(&self) -> Result<Vec<Txid>, NodeProviderError> {
            Ok(Vec::new())
        }
        async fn get_mempool_transactions_verbose(&self, _txids: &[Txid]) -> Result<Vec<MempoolTransaction>, NodeProviderError> {
            Ok(Vec::new())
        }
    }

    fn genesis() -> FullBlock {
        FullBlock::new(0, genesis_block(BtcNetwork::Regtest))
    }

    fn child_of(parent: &FullBlock, height: u64, nonce_seed: u32) -> FullBlock {
        let mut header = parent.block.header;
        header.prev_blockhash = parent.block_hash();
        header.nonce = header.nonce.wrapping_add(nonce_seed);
        FullBlock::new(height, bitcoin::Block { header, txdata: parent.block.txdata.clone() })
    }

    fn test_state() -> PipelineState {
        let mut network = NetworkAggregate::new(100);
        network.init(RequestId::new(), Some(0), 0, false).unwrap();
        let models = vec![ModelEntry::new(Box::new(TxCountModel::new()), AggregateOptions::default())];
        PipelineState::new(network, AggregateOptions::default(), models)
    }

    #[tokio::test]
    async fn process_batch_extends_the_network_and_runs_every_model() {
        let mut state = test_state();
        let store = InMemoryEventStore::new();
        let genesis = genesis();
        let node = FakeNode { canonical: vec![genesis.block_hash()] };
        let config = NetworkConfig::for_network(Network::Regtest);

        let outcome = process_batch(&mut state, &node, &store, &config, &[genesis]).await.unwrap();

        assert_eq!(outcome.confirmed_hashes.len(), 1);
        assert!(outcome.reorg_fork_height.is_none());
        assert_eq!(state.network.last_block_height(), 0);
        assert_eq!(
            state.models[0].model.to_json_payload(),
            Some(serde_json::json!({ "totalTxCount": 1 }))
        );
    }

    #[tokio::test]
    async fn a_tip_mismatch_triggers_the_reorg_path_instead_of_an_error() {
        let mut state = test_state();
        let store = InMemoryEventStore::new();
        let config = NetworkConfig::for_network(Network::Regtest);

        let genesis = genesis();
        let block_1 = child_of(&genesis, 1, 1);
        let diverging_block_1 = child_of(&genesis, 1, 2);
        // The node's view of height 1 is `diverging_block_1`, not the
        // `block_1` we're about to accept — it's already past the point
        // of the real-world reorg by the time we notice locally.
        let node = FakeNode { canonical: vec![genesis.block_hash(), diverging_block_1.block_hash()] };

        process_batch(&mut state, &node, &store, &config, &[genesis.clone(), block_1]).await.unwrap();
        assert_eq!(state.network.last_block_height(), 1);

        // A second diverging block 1 batch no longer extends the tip we
        // just accepted (wrong height for the current tip).
        let outcome = process_batch(&mut state, &node, &store, &config, &[diverging_block_1]).await.unwrap();

        assert!(outcome.confirmed_hashes.is_empty());
        assert_eq!(outcome.reorg_fork_height, Some(0));
        assert_eq!(state.network.last_block_height(), 0);
    }
}

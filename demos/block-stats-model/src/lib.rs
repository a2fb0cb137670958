//! Example [`UserModel`] implementation: tracks transaction count and
//! total virtual size per block, plus a running total across every
//! block it has seen. Exercises the `UserModel` contract end to end
//! without pulling in any domain logic of its own.

use async_trait::async_trait;
use crawler_aggregate::{Aggregate, AggregateError, Event, NO_BLOCK_HEIGHT};
use crawler_models::{BlockContext, UserModel, UserModelError};
use crawler_primitives::RequestId;
use serde::{Deserialize, Serialize};

const AGGREGATE_ID: &str = "block-stats";
const EVENT_BLOCK_STATS_RECORDED: &str = "BlockStatsRecorded";

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct BlockStatsRecorded {
    tx_count: u64,
    total_vsize: u64,
}

/// Per-block tx count/vsize plus running totals since genesis.
#[derive(Debug, Default)]
pub struct BlockStatsModel {
    version: u64,
    last_block_height: i64,
    uncommitted: Vec<Event>,
    last_tx_count: u64,
    last_total_vsize: u64,
    total_tx_count: u64,
    total_vsize: u64,
}

impl BlockStatsModel {
    pub fn new() -> Self {
        Self { last_block_height: NO_BLOCK_HEIGHT, ..Default::default() }
    }

    pub fn last_tx_count(&self) -> u64 {
        self.last_tx_count
    }

    pub fn last_total_vsize(&self) -> u64 {
        self.last_total_vsize
    }
}

impl Aggregate for BlockStatsModel {
    fn aggregate_id(&self) -> &str {
        AGGREGATE_ID
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
            EVENT_BLOCK_STATS_RECORDED => {
                let stats: BlockStatsRecorded =
                    serde_json::from_value(event.payload.clone()).map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
                self.last_tx_count = stats.tx_count;
                self.last_total_vsize = stats.total_vsize;
                self.total_tx_count += stats.tx_count;
                self.total_vsize += stats.total_vsize;
                Ok(())
            }
            other => Err(AggregateError::UnknownEventType(other.to_string())),
        }
    }

    fn serialize_user_state(&self) -> Result<Vec<u8>, AggregateError> {
        #[derive(Serialize)]
        struct Snapshot {
            last_tx_count: u64,
            last_total_vsize: u64,
            total_tx_count: u64,
            total_vsize: u64,
        }
        bincode::serialize(&Snapshot {
            last_tx_count: self.last_tx_count,
            last_total_vsize: self.last_total_vsize,
            total_tx_count: self.total_tx_count,
            total_vsize: self.total_vsize,
        })
        .map_err(|e| AggregateError::CorruptSnapshot(e.to_string()))
    }

    fn restore_user_state(&mut self, bytes: &[u8]) -> Result<(), AggregateError> {
        #[derive(Deserialize)]
        struct Snapshot {
            last_tx_count: u64,
            last_total_vsize: u64,
            total_tx_count: u64,
            total_vsize: u64,
        }
        let snapshot: Snapshot = bincode::deserialize(bytes).map_err(|e| AggregateError::CorruptSnapshot(e.to_string()))?;
        self.last_tx_count = snapshot.last_tx_count;
        self.last_total_vsize = snapshot.last_total_vsize;
        self.total_tx_count = snapshot.total_tx_count;
        self.total_vsize = snapshot.total_vsize;
        Ok(())
    }

    fn reset(&mut self) {
        self.version = 0;
        self.last_block_height = NO_BLOCK_HEIGHT;
        self.uncommitted.clear();
        self.last_tx_count = 0;
        self.last_total_vsize = 0;
        self.total_tx_count = 0;
        self.total_vsize = 0;
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
impl UserModel for BlockStatsModel {
    async fn process_block(&mut self, ctx: &BlockContext<'_>) -> Result<(), UserModelError> {
        let tx_count = ctx.block.block.txdata.len() as u64;
        let total_vsize = ctx.block.block.txdata.iter().map(|tx| tx.vsize() as u64).sum();
        let stats = BlockStatsRecorded { tx_count, total_vsize };
        self.apply(
            RequestId::new(),
            EVENT_BLOCK_STATS_RECORDED,
            ctx.block.height as i64,
            serde_json::to_value(stats).map_err(|e| UserModelError::Failed(e.to_string()))?,
        )?;
        Ok(())
    }

    fn to_json_payload(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "lastTxCount": self.last_tx_count,
            "lastTotalVsize": self.last_total_vsize,
            "totalTxCount": self.total_tx_count,
            "totalVsize": self.total_vsize,
        }))
    }

    fn as_aggregate_mut(&mut self) -> &mut dyn Aggregate {
        self
    }

    fn as_aggregate(&self) -> &dyn Aggregate {
        self
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{blockdata::constants::genesis_block, Network as BtcNetwork};
    use crawler_network::NetworkAggregate;
    use crawler_node_provider::{BlockStats, MempoolTransaction, NodeProvider, NodeProviderError};
    use crawler_primitives::{FullBlock, Network, NetworkConfig};

    use super::*;

    struct NoopProvider;

    #[async_trait]
    impl NodeProvider for NoopProvider {
        async fn get_current_block_height_from_network(&self) -> Result<u64, NodeProviderError> {
            Ok(0)
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
        async fn get_many_blocks_by_hashes(&self, _hashes: &[bitcoin::BlockHash]) -> Result<Vec<FullBlock>, NodeProviderError> {
            Ok(Vec::new())
        }
        async fn get_block_hash_at_height(&self, _height: u64) -> Result<bitcoin::BlockHash, NodeProviderError> {
            Ok(genesis_block(BtcNetwork::Regtest).block_hash())
        }
        async fn list_mempool_txids(&self) -> Result<Vec<bitcoin::Txid>, NodeProviderError> {
            Ok(Vec::new())
        }
        async fn get_mempool_transactions_verbose(
            &self,
            _txids: &[bitcoin::Txid],
        ) -> Result<Vec<MempoolTransaction>, NodeProviderError> {
            Ok(Vec::new())
        }
    }

    struct NoSiblings;

    #[async_trait]
    impl crawler_models::UserModelService for NoSiblings {
        async fn model_snapshot(&self, _model_id: &str) -> Option<serde_json::Value> {
            None
        }
    }

    fn ctx_for<'a>(
        block: &'a FullBlock,
        config: &'a NetworkConfig,
        network: &'a NetworkAggregate,
        node: &'a NoopProvider,
        siblings: &'a NoSiblings,
    ) -> BlockContext<'a> {
        BlockContext {
            block,
            network_config: config,
            services: crawler_models::ModelServices { node_provider: node, network, user_models: siblings },
            mempool: None,
        }
    }

    #[tokio::test]
    async fn process_block_records_tx_count_and_accumulates_totals() {
        let mut model = BlockStatsModel::new();
        let block = FullBlock::new(0, genesis_block(BtcNetwork::Regtest));
        let network = NetworkAggregate::new(1000);
        let node = NoopProvider;
        let siblings = NoSiblings;
        let config = NetworkConfig::for_network(Network::Regtest);

        let ctx = ctx_for(&block, &config, &network, &node, &siblings);
        model.process_block(&ctx).await.unwrap();

        assert_eq!(model.last_tx_count(), 1);
        assert_eq!(model.uncommitted_events().len(), 1);

        let snapshot = model.to_json_payload().unwrap();
        assert_eq!(snapshot["lastTxCount"], 1);
        assert_eq!(snapshot["totalTxCount"], 1);
    }

    #[test]
    fn snapshot_round_trips_through_serialize_user_state() {
        let mut model = BlockStatsModel::new();
        model.last_tx_count = 3;
        model.last_total_vsize = 900;
        model.total_tx_count = 10;
        model.total_vsize = 4000;

        let bytes = model.serialize_user_state().unwrap();
        let mut restored = BlockStatsModel::new();
        restored.restore_user_state(&bytes).unwrap();

        assert_eq!(restored.total_tx_count, 10);
        assert_eq!(restored.total_vsize, 4000);
        assert_eq!(restored.last_tx_count, 3);
        assert_eq!(restored.last_total_vsize, 900);
    }
}

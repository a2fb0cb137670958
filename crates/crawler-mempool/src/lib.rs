//! The optional Mempool aggregate (spec §4.6): a bounded, independently
//! refreshed cache of unconfirmed transactions. Its lifecycle is
//! orthogonal to block ingestion — a sync loop drives `process_sync`
//! on its own schedule.

mod aggregate;
mod entry;
mod error;
mod events;
mod options;

pub use aggregate::{MempoolAggregate, MempoolStats, AGGREGATE_ID};
pub use entry::MempoolEntry;
pub use error::MempoolAggregateError;
pub use events::{
    MempoolBlockConfirmed, MempoolIncrementalSync, MempoolInitialized, MempoolReorganized, MempoolTxMeta,
    EVENT_MEMPOOL_BLOCK_CONFIRMED, EVENT_MEMPOOL_INCREMENTAL_SYNC, EVENT_MEMPOOL_INITIALIZED, EVENT_MEMPOOL_REORGANIZED,
};
pub use options::MempoolOptions;

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use bitcoin::{hashes::Hash, BlockHash, Txid};
    use crawler_node_provider::{BlockStats, MempoolTransaction, NodeProvider, NodeProviderError};
    use crawler_primitives::{FullBlock, RequestId};

    use super::*;

    struct FakeProvider {
        live_txids: Vec<Txid>,
        verbose: Vec<MempoolTransaction>,
    }

    #[async_trait]
    impl NodeProvider for FakeProvider {
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

        async fn get_many_blocks_by_hashes(&self, _hashes: &[BlockHash]) -> Result<Vec<FullBlock>, NodeProviderError> {
            Ok(Vec::new())
        }

        async fn get_block_hash_at_height(&self, _height: u64) -> Result<BlockHash, NodeProviderError> {
            Ok(BlockHash::all_zeros())
        }

        async fn list_mempool_txids(&self) -> Result<Vec<Txid>, NodeProviderError> {
            Ok(self.live_txids.clone())
        }

        async fn get_mempool_transactions_verbose(&self, txids: &[Txid]) -> Result<Vec<MempoolTransaction>, NodeProviderError> {
            Ok(self.verbose.iter().filter(|tx| txids.contains(&tx.txid)).cloned().collect())
        }
    }

    fn txid(byte: u8) -> Txid {
        Txid::from_byte_array([byte; 32])
    }

    #[test]
    fn init_inserts_entries_above_the_min_fee_rate() {
        let mut mempool = MempoolAggregate::new(MempoolOptions { min_fee_rate_sat_per_vb: 5.0, ..Default::default() });
        let entries = vec![
            MempoolTxMeta { txid: txid(1), vsize: 200, fee_sat: 2000, modified_fee_sat: None, time: 0, provider: "t".into() },
            MempoolTxMeta { txid: txid(2), vsize: 200, fee_sat: 100, modified_fee_sat: None, time: 0, provider: "t".into() },
        ];
        mempool.init(RequestId::default(), entries).unwrap();
        assert!(mempool.contains(&txid(1)));
        assert!(!mempool.contains(&txid(2)));
    }

    #[tokio::test]
    async fn process_sync_adds_and_removes_by_diff() {
        let mut mempool = MempoolAggregate::new(MempoolOptions::default());
        mempool
            .init(
                RequestId::default(),
                vec![MempoolTxMeta { txid: txid(1), vsize: 200, fee_sat: 1000, modified_fee_sat: None, time: 0, provider: "t".into() }],
            )
            .unwrap();

        let node = FakeProvider {
            live_txids: vec![txid(2)],
            verbose: vec![MempoolTransaction { txid: txid(2), vsize: 150, fee_sat: 900, time: 1 }],
        };
        mempool.process_sync(RequestId::default(), &node).await.unwrap();

        assert!(!mempool.contains(&txid(1)));
        assert!(mempool.contains(&txid(2)));
    }

    #[test]
    fn process_blocks_batch_removes_confirmed_txids() {
        let mut mempool = MempoolAggregate::new(MempoolOptions::default());
        mempool
            .init(
                RequestId::default(),
                vec![MempoolTxMeta { txid: txid(1), vsize: 200, fee_sat: 1000, modified_fee_sat: None, time: 0, provider: "t".into() }],
            )
            .unwrap();

        mempool.process_blocks_batch(RequestId::default(), 10, &[txid(1)]).unwrap();
        assert!(!mempool.contains(&txid(1)));
    }

    #[tokio::test]
    async fn process_reorganisation_reinserts_orphaned_txids() {
        let mut mempool = MempoolAggregate::new(MempoolOptions::default());
        let node = FakeProvider {
            live_txids: Vec::new(),
            verbose: vec![MempoolTransaction { txid: txid(3), vsize: 200, fee_sat: 1500, time: 2 }],
        };
        mempool.process_reorganisation(RequestId::default(), &node, &[txid(3)]).await.unwrap();
        assert!(mempool.contains(&txid(3)));
    }

    #[test]
    fn stats_are_recomputed_lazily() {
        let mut mempool = MempoolAggregate::new(MempoolOptions::default());
        mempool
            .init(
                RequestId::default(),
                vec![MempoolTxMeta { txid: txid(1), vsize: 100, fee_sat: 1000, modified_fee_sat: None, time: 0, provider: "t".into() }],
            )
            .unwrap();
        let stats = mempool.stats();
        assert_eq!(stats.entry_count, 1);
        assert!((stats.avg_fee_rate - 10.0).abs() < f64::EPSILON);
    }
}

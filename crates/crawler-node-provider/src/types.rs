use bitcoin::{BlockHash, Txid};
use serde::{Deserialize, Serialize};

/// One row of `getManyBlocksStatsByHeights` (spec §6.2) — just enough
/// to drive fee-rate-independent block bookkeeping without fetching
/// the full block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockStats {
    pub height: u64,
    pub blockhash: BlockHash,
    pub total_size: u64,
}

/// A verbose mempool entry, the subset of `getrawmempool true` /
/// `getmempoolentry` fields the mempool aggregate needs for its
/// fee-rate filter (spec §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MempoolTransaction {
    pub txid: Txid,
    pub vsize: u64,
    pub fee_sat: u64,
    pub time: i64,
}

impl MempoolTransaction {
    /// Satoshis per virtual byte; the quantity the mempool's min
    /// fee-rate filter compares against.
    pub fn fee_rate_sat_per_vb(&self) -> f64 {
        if self.vsize == 0 {
            return 0.0;
        }
        self.fee_sat as f64 / self.vsize as f64
    }
}

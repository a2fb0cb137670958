use bitcoin::Txid;
use serde::{Deserialize, Serialize};

pub const EVENT_MEMPOOL_INITIALIZED: &str = "MempoolInitialized";
pub const EVENT_MEMPOOL_INCREMENTAL_SYNC: &str = "MempoolIncrementalSync";
pub const EVENT_MEMPOOL_BLOCK_CONFIRMED: &str = "MempoolBlockConfirmed";
pub const EVENT_MEMPOOL_REORGANIZED: &str = "MempoolReorganized";

/// The metadata fetched from the node for one mempool transaction.
/// Events carry this directly (not just the txid) so replay never
/// needs a live node connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MempoolTxMeta {
    pub txid: Txid,
    pub vsize: u64,
    pub fee_sat: u64,
    pub modified_fee_sat: Option<u64>,
    pub time: i64,
    pub provider: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MempoolInitialized {
    pub entries: Vec<MempoolTxMeta>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MempoolIncrementalSync {
    pub added: Vec<MempoolTxMeta>,
    pub removed: Vec<Txid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MempoolBlockConfirmed {
    pub confirmed: Vec<Txid>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MempoolReorganized {
    pub reinserted: Vec<MempoolTxMeta>,
}

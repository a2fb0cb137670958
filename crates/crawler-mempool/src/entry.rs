use std::collections::BTreeSet;

use bitcoin::Txid;

use crate::events::MempoolTxMeta;

/// One tracked mempool transaction (spec §3.1's `MempoolEntry`).
#[derive(Debug, Clone)]
pub struct MempoolEntry {
    pub txid: Txid,
    pub vsize: u64,
    pub fee_sat: u64,
    pub modified_fee_sat: Option<u64>,
    pub time: i64,
    pub providers: BTreeSet<String>,
}

impl MempoolEntry {
    pub fn from_meta(meta: &MempoolTxMeta) -> Self {
        let mut providers = BTreeSet::new();
        providers.insert(meta.provider.clone());
        Self {
            txid: meta.txid,
            vsize: meta.vsize,
            fee_sat: meta.fee_sat,
            modified_fee_sat: meta.modified_fee_sat,
            time: meta.time,
            providers,
        }
    }

    /// `max(modifiedfee, fee) / vsize`, zero for a zero-size entry.
    pub fn fee_rate_sat_per_vb(&self) -> f64 {
        if self.vsize == 0 {
            return 0.0;
        }
        let effective = self.fee_sat.max(self.modified_fee_sat.unwrap_or(self.fee_sat));
        effective as f64 / self.vsize as f64
    }

    /// Rough memory footprint used for the byte-budget eviction rule,
    /// approximated from `vsize` (spec §3.3) rather than the raw tx
    /// bytes, which this entry doesn't retain.
    pub fn approx_bytes(&self) -> u64 {
        64 + self.vsize
    }
}

/// Memory discipline knobs (spec §4.6: "a minimum fee-rate filter
/// drops sub-threshold transactions; an LRU evicts when entry count or
/// byte budget is exceeded").
#[derive(Debug, Clone)]
pub struct MempoolOptions {
    pub capacity: usize,
    pub max_bytes: u64,
    pub min_fee_rate_sat_per_vb: f64,
}

impl Default for MempoolOptions {
    fn default() -> Self {
        Self { capacity: 100_000, max_bytes: 256 * 1024 * 1024, min_fee_rate_sat_per_vb: 0.0 }
    }
}

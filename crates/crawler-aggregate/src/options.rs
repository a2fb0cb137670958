use serde::{Deserialize, Serialize};

/// Per-aggregate persistence options (spec §3.1's `AggregateState.options`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateOptions {
    pub snapshots_enabled: bool,
    pub snapshot_interval: u64,
    pub allow_pruning: bool,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            snapshots_enabled: true,
            snapshot_interval: 1000,
            allow_pruning: false,
        }
    }
}

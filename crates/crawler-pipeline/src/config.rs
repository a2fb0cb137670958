use std::time::Duration;

use crawler_primitives::NetworkConfig;

/// Pipeline task settings (spec §4.5, §6.5's derived
/// `queueIteratorBlocksBatchSize`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub network_config: NetworkConfig,
    pub iterator_batch_size: usize,
    pub idle_poll_interval: Duration,
    /// Spec §4.4's `maxBlockHeight`, mirrored here so the task can tell
    /// "nothing queued because we've crawled everything" apart from
    /// "nothing queued yet, keep waiting".
    pub max_block_height: Option<u64>,
    /// How often to run the mempool's independent sync (spec §4.6).
    /// `None` disables it (also the right value when no mempool
    /// aggregate is configured on the state).
    pub mempool_sync_interval: Option<Duration>,
}

impl PipelineConfig {
    pub fn new(network_config: NetworkConfig) -> Self {
        Self {
            network_config,
            iterator_batch_size: 8,
            idle_poll_interval: Duration::from_millis(500),
            max_block_height: None,
            mempool_sync_interval: None,
        }
    }
}

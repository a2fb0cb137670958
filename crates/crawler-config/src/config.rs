use crawler_primitives::NetworkConfig;
use serde::Deserialize;

/// Top-level config tree deserialized from TOML (spec §6.5's enumerated
/// options), then optionally patched by CLI `-o`/env overrides before
/// being handed to the rest of the crawler.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub data_dir: String,
    pub start_block_height: Option<u64>,
    pub max_block_height: Option<u64>,
    /// Spec §4.2's network aggregate ring size (`maxSize ≈ 1000`).
    #[serde(default = "default_network_ring_size")]
    pub network_ring_size: usize,
    pub network: NetworkConfig,
    pub blocks_queue: BlocksQueueSettings,
    pub mempool: MempoolSettings,
    pub event_store: EventStoreSettings,
    pub provider: ProviderSettings,
}

fn default_network_ring_size() -> usize {
    1000
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlocksQueueSettings {
    pub loader_strategy_name: String,
    pub loader_preloader_base_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MempoolSettings {
    pub min_fee_rate: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventStoreSettings {
    pub snapshot_interval: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub rpc_user: String,
    pub rpc_password: String,
    pub retry_count: u8,
    pub retry_interval: u16,
    pub rate_limit_max_concurrent_requests: usize,
    pub rate_limit_max_batch_size: usize,
    pub rate_limit_request_delay_ms: u64,
    pub network_rpc_urls: Vec<String>,
    pub mempool_rpc_urls: Vec<String>,
}

impl Config {
    /// `queueIteratorBlocksBatchSize = 2 × maxBlockWeight` (spec §6.5).
    pub fn queue_iterator_blocks_batch_size(&self) -> u64 {
        2 * self.network.max_block_weight
    }

    /// `queueLoaderRequestBlocksBatchSize = 2 × maxBlockWeight` (spec §6.5).
    pub fn queue_loader_request_blocks_batch_size(&self) -> u64 {
        2 * self.network.max_block_weight
    }

    /// `maxQueueSize = 10 × queueIteratorBlocksBatchSize` (spec §6.5).
    pub fn max_queue_size(&self) -> u64 {
        10 * self.queue_iterator_blocks_batch_size()
    }
}

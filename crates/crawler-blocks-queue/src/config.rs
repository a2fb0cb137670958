use std::{sync::Arc, time::Duration};

use crate::strategy::LoaderStrategy;

/// Spec §4.4/§6.5 sizing knobs. `max_queue_size_bytes` is the
/// `maxQueueSize` backpressure bound; the two batch sizes are the
/// `queueLoaderRequestBlocksBatchSize`/`queueIteratorBlocksBatchSize`
/// derived config values.
pub struct BlocksQueueConfig {
    pub initial_height: i64,
    /// Spec §4.4's `maxBlockHeight`: the loader stops requesting past
    /// this height and the iterator drains what's already queued.
    /// `None` means crawl indefinitely.
    pub max_height: Option<u64>,
    pub max_queue_size_bytes: u64,
    pub loader_request_batch_size: usize,
    pub iterator_batch_size: usize,
    pub idle_poll_interval: Duration,
    pub strategy: Arc<dyn LoaderStrategy>,
}

impl BlocksQueueConfig {
    pub fn new(initial_height: i64, strategy: Arc<dyn LoaderStrategy>) -> Self {
        Self {
            initial_height,
            max_height: None,
            max_queue_size_bytes: 256 * 1024 * 1024,
            loader_request_batch_size: 16,
            iterator_batch_size: 8,
            idle_poll_interval: Duration::from_millis(500),
            strategy,
        }
    }
}

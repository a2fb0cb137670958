use crawler_aggregate::AggregateOptions;
use crawler_mempool::MempoolAggregate;
use crawler_network::NetworkAggregate;

use crate::registry::ModelEntry;

/// The long-lived, in-memory aggregates a pipeline run drives: loaded
/// once at startup (spec §4.5's "load network aggregate from store;
/// instantiate and replay each user model") and kept up to date batch
/// by batch, rather than reloaded from the store on every batch.
pub struct PipelineState {
    pub network: NetworkAggregate,
    pub network_options: AggregateOptions,
    pub mempool: Option<MempoolAggregate>,
    pub mempool_options: AggregateOptions,
    pub models: Vec<ModelEntry>,
}

impl PipelineState {
    pub fn new(network: NetworkAggregate, network_options: AggregateOptions, models: Vec<ModelEntry>) -> Self {
        Self { network, network_options, mempool: None, mempool_options: AggregateOptions::default(), models }
    }

    pub fn with_mempool(mut self, mempool: MempoolAggregate, options: AggregateOptions) -> Self {
        self.mempool = Some(mempool);
        self.mempool_options = options;
        self
    }
}

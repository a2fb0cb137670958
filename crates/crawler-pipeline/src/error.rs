use thiserror::Error;

/// Errors raised while driving a batch through the network aggregate,
/// user models, mempool and event store.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("event store: {0}")]
    Store(#[from] crawler_event_store::StoreError),

    #[error("network aggregate: {0}")]
    Network(#[from] crawler_network::NetworkAggregateError),

    #[error("mempool aggregate: {0}")]
    Mempool(#[from] crawler_mempool::MempoolAggregateError),

    #[error("user model: {0}")]
    UserModel(#[from] crawler_models::UserModelError),

    #[error("node provider: {0}")]
    NodeProvider(#[from] crawler_node_provider::NodeProviderError),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MempoolAggregateError {
    #[error("node provider: {0}")]
    NodeProvider(#[from] crawler_node_provider::NodeProviderError),

    #[error(transparent)]
    Aggregate(#[from] crawler_aggregate::AggregateError),
}

impl From<serde_json::Error> for MempoolAggregateError {
    fn from(e: serde_json::Error) -> Self {
        MempoolAggregateError::Aggregate(crawler_aggregate::AggregateError::HandlerFailed(e.to_string()))
    }
}

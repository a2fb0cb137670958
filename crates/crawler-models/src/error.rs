use thiserror::Error;

/// Errors a [`crate::UserModel`] invocation can raise. Per spec §4.5,
/// any error here aborts the whole batch — no partial save, and the
/// batch may be retried.
#[derive(Debug, Error)]
pub enum UserModelError {
    #[error(transparent)]
    Aggregate(#[from] crawler_aggregate::AggregateError),

    #[error("node provider: {0}")]
    NodeProvider(#[from] crawler_node_provider::NodeProviderError),

    #[error("model processing failed: {0}")]
    Failed(String),
}

use thiserror::Error;

/// Errors raised by an [`crate::EventStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The smallest event's version in a `save` batch wasn't
    /// `current_stored_version + 1` for its aggregate (spec §4.3 step
    /// 2). The whole batch is aborted; the caller may retry.
    #[error("concurrency conflict for aggregate {aggregate_id}: expected version {expected}, got {actual}")]
    Conflict {
        aggregate_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("aggregate error: {0}")]
    Aggregate(#[from] crawler_aggregate::AggregateError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("transaction error: {0}")]
    Transaction(String),
}

use thiserror::Error;

/// Errors raised by the network aggregate (spec §4.2, §7).
#[derive(Debug, Error)]
pub enum NetworkAggregateError {
    /// `addBlocks` rejected a block that doesn't extend the current tip
    /// by height and previous-hash. No event is emitted; the pipeline
    /// catches this and starts the reorg path.
    #[error("block at height {actual_height} does not extend tip at {expected_height}")]
    BlockchainValidation { expected_height: u64, actual_height: u64 },

    /// `reorganisation` walked back past the retained ring without
    /// finding a common ancestor. Operator intervention is required;
    /// the window is too shallow for how deep the reorg actually is.
    #[error("no common ancestor within the retained window of {window} blocks")]
    ReorgBeyondRetainedWindow { window: usize },

    /// The collaborator used to fetch canonical block hashes during
    /// reorg fork-point search failed.
    #[error("fork lookup failed: {0}")]
    ForkLookup(String),

    #[error(transparent)]
    Aggregate(#[from] crawler_aggregate::AggregateError),
}

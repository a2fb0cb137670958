use thiserror::Error;

/// Errors raised while applying, replaying or (de)serializing an
/// aggregate's state.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    #[error("handler rejected event during live apply: {0}")]
    HandlerFailed(String),

    /// A handler failed during `load_from_history`. Per spec §4.1/§7
    /// this is fatal corruption, not a retryable error.
    #[error("replay failed, aggregate state is corrupt: {0}")]
    ReplayFailed(#[source] Box<AggregateError>),

    #[error("corrupt snapshot payload: {0}")]
    CorruptSnapshot(String),
}

use thiserror::Error;

/// Errors raised by an [`crate::EventPublisher`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// No subscriber was listening; at-least-once delivery is only
    /// meaningful once something is. Not fatal — the event stays
    /// `Unpublished` and is retried on the next `unpublished_events`
    /// sweep.
    #[error("no subscribers for event type {0}")]
    NoSubscribers(String),
}

use std::collections::HashMap;

use async_trait::async_trait;
use crawler_aggregate::Event;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use crate::error::TransportError;

/// How newly committed events reach subscribers (spec §4.3 step 4,
/// §6.4's subscribe-by-event-type). The event store calls `publish`
/// once per committed event and marks it `PUBLISHED` only after this
/// returns `Ok`; at-least-once delivery falls out of retrying
/// `publish` for whatever `EventStore::unpublished_events` still
/// returns, not from anything this trait itself guarantees.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> Result<(), TransportError>;
}

const CHANNEL_CAPACITY: usize = 1024;

/// An in-process [`EventPublisher`] backed by one `tokio::sync::broadcast`
/// channel per event type, created lazily on first
/// [`ChannelPublisher::subscribe`]. Sufficient for the demo app and
/// integration tests; a real deployment's transport (HTTP/WebSocket,
/// message queue) implements [`EventPublisher`] itself instead.
#[derive(Debug, Default)]
pub struct ChannelPublisher {
    channels: Mutex<HashMap<String, broadcast::Sender<Event>>>,
}

impl ChannelPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every future `PUBLISHED` event of `event_type`.
    pub async fn subscribe(&self, event_type: &str) -> broadcast::Receiver<Event> {
        let mut channels = self.channels.lock().await;
        channels.entry(event_type.to_string()).or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0).subscribe()
    }
}

#[async_trait]
impl EventPublisher for ChannelPublisher {
    async fn publish(&self, event: &Event) -> Result<(), TransportError> {
        let channels = self.channels.lock().await;
        match channels.get(&event.event_type) {
            Some(sender) if sender.receiver_count() > 0 => {
                let _ = sender.send(event.clone());
                Ok(())
            }
            _ => {
                debug!(event_type = %event.event_type, "publish with no subscribers");
                Err(TransportError::NoSubscribers(event.event_type.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crawler_aggregate::EventStatus;
    use crawler_primitives::RequestId;

    use super::*;

    fn sample_event(event_type: &str) -> Event {
        Event {
            aggregate_id: "network".to_string(),
            version: 1,
            request_id: RequestId::new(),
            event_type: event_type.to_string(),
            block_height: 0,
            payload: serde_json::json!({}),
            status: EventStatus::Unpublished,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_without_a_subscriber_is_reported_as_such() {
        let publisher = ChannelPublisher::new();
        let err = publisher.publish(&sample_event("NetworkBlocksAdded")).await.unwrap_err();
        assert!(matches!(err, TransportError::NoSubscribers(_)));
    }

    #[tokio::test]
    async fn a_subscriber_receives_events_published_after_it_subscribes() {
        let publisher = ChannelPublisher::new();
        let mut rx = publisher.subscribe("NetworkBlocksAdded").await;

        publisher.publish(&sample_event("NetworkBlocksAdded")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event_type, "NetworkBlocksAdded");
    }

    #[tokio::test]
    async fn subscribers_to_a_different_type_do_not_see_unrelated_events() {
        let publisher = ChannelPublisher::new();
        let mut rx = publisher.subscribe("NetworkReorganized").await;

        let err = publisher.publish(&sample_event("NetworkBlocksAdded")).await.unwrap_err();
        assert!(matches!(err, TransportError::NoSubscribers(_)));
        assert!(rx.try_recv().is_err());
    }
}

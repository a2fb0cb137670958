use std::{sync::Arc, time::Duration};

use crawler_event_store::EventStore;
use crawler_transport::EventPublisher;
use tracing::{debug, warn};

/// Drains `EventStore::unpublished_events` on a fixed interval and
/// hands each to the publisher, marking it `PUBLISHED` only once the
/// publisher accepts it (spec §4.3 step 4's at-least-once delivery:
/// an event left `Unpublished` here is simply retried next tick).
pub(crate) async fn run(event_store: Arc<dyn EventStore>, publisher: Arc<dyn EventPublisher>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;

        let events = match event_store.unpublished_events().await {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "failed to list unpublished events");
                continue;
            }
        };
        if events.is_empty() {
            continue;
        }

        let mut published_by_aggregate: std::collections::HashMap<String, Vec<u64>> = std::collections::HashMap::new();
        for event in &events {
            match publisher.publish(event).await {
                Ok(()) => {
                    published_by_aggregate.entry(event.aggregate_id.clone()).or_default().push(event.version);
                }
                Err(e) => {
                    debug!(aggregate_id = %event.aggregate_id, version = event.version, error = %e, "event left unpublished");
                }
            }
        }

        for (aggregate_id, versions) in published_by_aggregate {
            if let Err(e) = event_store.mark_published(&aggregate_id, &versions).await {
                warn!(aggregate_id = %aggregate_id, error = %e, "failed to mark events published");
            }
        }
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use crawler_aggregate::{crosses_snapshot_boundary, Aggregate, AggregateOptions, Event, EventStatus, Snapshot};
use parking_lot::RwLock;

use crate::{error::StoreError, traits::{EventFilter, EventStore, SaveItem}};

#[derive(Default)]
struct Stream {
    events: Vec<Event>,
    snapshot: Option<Snapshot>,
}

impl Stream {
    fn current_version(&self) -> u64 {
        self.events.last().map(|e| e.version).unwrap_or(0)
    }
}

/// A `parking_lot`-backed in-memory event store, grounded on the
/// `cq-rs` crate's `EventStore`/`StateStore` (upgradable-read append
/// pattern). Used by tests across the workspace so they don't need a
/// filesystem.
#[derive(Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<String, Stream>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn load_into(
        aggregate: &mut dyn Aggregate,
        snapshot: Option<Snapshot>,
        events: &[Event],
    ) -> Result<(), StoreError> {
        aggregate.reset();
        if let Some(snapshot) = snapshot {
            aggregate.restore_from(snapshot)?;
        }
        let since_version = aggregate.version();
        let tail: Vec<Event> = events.iter().filter(|e| e.version > since_version).cloned().collect();
        aggregate.load_from_history(&tail)?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn get_one(
        &self,
        aggregate: &mut dyn Aggregate,
        _options: &AggregateOptions,
    ) -> Result<(), StoreError> {
        let streams = self.streams.read();
        let stream = streams.get(aggregate.aggregate_id());
        let (snapshot, events): (Option<Snapshot>, Vec<Event>) = match stream {
            Some(s) => (s.snapshot.clone(), s.events.clone()),
            None => (None, Vec::new()),
        };
        Self::load_into(aggregate, snapshot, &events)
    }

    async fn get_one_at(
        &self,
        aggregate: &mut dyn Aggregate,
        _options: &AggregateOptions,
        block_height: i64,
    ) -> Result<(), StoreError> {
        let streams = self.streams.read();
        let stream = streams.get(aggregate.aggregate_id());
        let (snapshot, events): (Option<Snapshot>, Vec<Event>) = match stream {
            Some(s) => (s.snapshot.clone(), s.events.clone()),
            None => (None, Vec::new()),
        };
        let snapshot = snapshot.filter(|s| s.block_height <= block_height);
        let since_version = snapshot.as_ref().map(|s| s.version).unwrap_or(0);
        let tail: Vec<Event> = events.into_iter().filter(|e| e.version > since_version).collect();
        aggregate.rollback_to(snapshot, &tail, block_height)?;
        Ok(())
    }

    async fn save(&self, items: &mut [SaveItem<'_>]) -> Result<(), StoreError> {
        let mut streams = self.streams.write();

        // Validate optimistic concurrency for every aggregate before mutating any of them.
        for item in items.iter() {
            let pending = item.aggregate.uncommitted_events();
            let Some(first) = pending.first() else { continue };
            let current = streams
                .get(item.aggregate.aggregate_id())
                .map(Stream::current_version)
                .unwrap_or(0);
            if first.version != current + 1 {
                return Err(StoreError::Conflict {
                    aggregate_id: item.aggregate.aggregate_id().to_string(),
                    expected: current + 1,
                    actual: first.version,
                });
            }
        }

        for item in items.iter_mut() {
            let id = item.aggregate.aggregate_id().to_string();
            let drained = item.aggregate.commit();
            if drained.is_empty() {
                continue;
            }
            let stream = streams.entry(id).or_default();
            stream.events.extend(drained);

            let version = item.aggregate.version();
            if crosses_snapshot_boundary(item.options, version) {
                stream.snapshot = Some(item.aggregate.snapshot()?);
            }
        }

        Ok(())
    }

    async fn rollback(
        &self,
        models_to_rollback: &[String],
        block_height: i64,
        models_to_save: &mut [SaveItem<'_>],
    ) -> Result<(), StoreError> {
        let mut streams = self.streams.write();

        for id in models_to_rollback {
            if let Some(stream) = streams.get_mut(id) {
                if block_height < 0 {
                    stream.events.clear();
                    stream.snapshot = None;
                } else {
                    stream.events.retain(|e| e.block_height <= block_height);
                    if let Some(snap) = &stream.snapshot {
                        if snap.block_height > block_height {
                            stream.snapshot = None;
                        }
                    }
                }
            }
        }

        for item in models_to_save.iter_mut() {
            let id = item.aggregate.aggregate_id().to_string();
            let drained = item.aggregate.commit();
            if drained.is_empty() {
                continue;
            }
            let stream = streams.entry(id).or_default();
            stream.events.extend(drained);
            let version = item.aggregate.version();
            if crosses_snapshot_boundary(item.options, version) {
                stream.snapshot = Some(item.aggregate.snapshot()?);
            }
        }

        Ok(())
    }

    async fn fetch_events(&self, aggregate_id: &str, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let streams = self.streams.read();
        let Some(stream) = streams.get(aggregate_id) else {
            return Ok(Vec::new());
        };
        let mut events: Vec<Event> = stream
            .events
            .iter()
            .filter(|e| filter.block_height.is_none_or(|h| e.block_height == h))
            .filter(|e| filter.min_version.is_none_or(|v| e.version >= v))
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
            .cloned()
            .collect();
        if let Some(offset) = filter.offset {
            events = events.into_iter().skip(offset).collect();
        }
        if let Some(limit) = filter.limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    async fn mark_published(&self, aggregate_id: &str, versions: &[u64]) -> Result<(), StoreError> {
        let mut streams = self.streams.write();
        if let Some(stream) = streams.get_mut(aggregate_id) {
            for event in stream.events.iter_mut() {
                if versions.contains(&event.version) {
                    event.status = EventStatus::Published;
                }
            }
        }
        Ok(())
    }

    async fn unpublished_events(&self) -> Result<Vec<Event>, StoreError> {
        let streams = self.streams.read();
        Ok(streams
            .values()
            .flat_map(|s| s.events.iter())
            .filter(|e| e.status == EventStatus::Unpublished)
            .cloned()
            .collect())
    }
}

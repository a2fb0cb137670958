use std::path::Path;

use async_trait::async_trait;
use crawler_aggregate::{crosses_snapshot_boundary, Aggregate, AggregateOptions, Event, EventStatus, Snapshot};
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError, Transactional, TransactionalTree,
};
use tokio::sync::Mutex;

use crate::{error::StoreError, traits::{EventFilter, EventStore, SaveItem}};

/// The durable default backend, grounded on the teacher's
/// `db-store-sled`/`db/store-sled` crates' choice of `sled` +
/// `bincode` for embedded, dependency-free persistence.
///
/// `events`/`snapshots`/`heads` are separate sled trees shared across
/// all aggregates; rows are namespaced by a `{aggregate_id}\0...` key
/// prefix rather than one tree per aggregate, since the set of
/// aggregate ids (the network, the mempool, and an open set of user
/// models) isn't known at open time.
///
/// `save`/`rollback` write across all three trees inside one
/// `sled::transaction` (spec §4.3 step 3's "insert all events in one
/// transaction"): a crash mid-write rolls back, it never leaves one
/// aggregate's events committed while a sibling's are missing. `lock`
/// still serializes the whole save/rollback operation (conflict-version
/// pre-check plus the transaction) across the crawler's one writer
/// task; sled's own transaction retry isn't relied on for that.
pub struct SledEventStore {
    db: sled::Db,
    events: sled::Tree,
    snapshots: sled::Tree,
    heads: sled::Tree,
    lock: Mutex<()>,
}

impl SledEventStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// An in-memory sled instance, used by tests that want the real
    /// backend's encoding without touching the filesystem.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, StoreError> {
        let events = db.open_tree("events")?;
        let snapshots = db.open_tree("snapshots")?;
        let heads = db.open_tree("heads")?;
        Ok(Self { db, events, snapshots, heads, lock: Mutex::new(()) })
    }

    fn prefix(aggregate_id: &str) -> Vec<u8> {
        let mut key = aggregate_id.as_bytes().to_vec();
        key.push(0);
        key
    }

    fn event_key(aggregate_id: &str, version: u64) -> Vec<u8> {
        let mut key = Self::prefix(aggregate_id);
        key.extend_from_slice(&version.to_be_bytes());
        key
    }

    fn head_version(&self, aggregate_id: &str) -> Result<u64, StoreError> {
        Ok(self
            .heads
            .get(aggregate_id)?
            .map(|v| u64::from_be_bytes(v.as_ref().try_into().expect("8-byte head version")))
            .unwrap_or(0))
    }

    fn snapshot_for(&self, aggregate_id: &str) -> Result<Option<Snapshot>, StoreError> {
        match self.snapshots.get(aggregate_id)? {
            Some(raw) => Ok(Some(bincode::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    fn all_events_for(&self, aggregate_id: &str) -> Result<Vec<Event>, StoreError> {
        let mut out = Vec::new();
        for kv in self.events.scan_prefix(Self::prefix(aggregate_id)) {
            let (_, raw) = kv?;
            out.push(bincode::deserialize(&raw)?);
        }
        Ok(out)
    }
}

/// A drained aggregate's pending writes, computed up front so the
/// transaction closure below only does infallible-by-construction sled
/// I/O (sled may re-run the closure on a write conflict; draining an
/// aggregate's uncommitted events is not safe to repeat).
struct PersistPlan {
    id: String,
    events: Vec<Event>,
    last_version: u64,
    snapshot: Option<Snapshot>,
}

fn persist_plan(aggregate: &mut dyn Aggregate, options: &AggregateOptions) -> Result<Option<PersistPlan>, StoreError> {
    let id = aggregate.aggregate_id().to_string();
    let drained = aggregate.commit();
    let Some(last_version) = drained.last().map(|e| e.version) else {
        return Ok(None);
    };
    let snapshot =
        if crosses_snapshot_boundary(options, aggregate.version()) { Some(aggregate.snapshot()?) } else { None };
    Ok(Some(PersistPlan { id, events: drained, last_version, snapshot }))
}

fn write_persist_plan(
    events_tx: &TransactionalTree,
    snapshots_tx: &TransactionalTree,
    heads_tx: &TransactionalTree,
    plan: &PersistPlan,
) -> ConflictableTransactionResult<(), StoreError> {
    for event in &plan.events {
        let value = bincode::serialize(event).map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
        events_tx.insert(SledEventStore::event_key(&plan.id, event.version), value)?;
    }
    heads_tx.insert(plan.id.as_bytes(), &plan.last_version.to_be_bytes())?;
    if let Some(snapshot) = &plan.snapshot {
        let value = bincode::serialize(snapshot).map_err(|e| ConflictableTransactionError::Abort(StoreError::from(e)))?;
        snapshots_tx.insert(plan.id.as_bytes(), value)?;
    }
    Ok(())
}

fn transaction_error(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => StoreError::Sled(e),
    }
}

/// One aggregate's rollback writes, keys pre-computed by a plain scan
/// (see the comment at its call site in `rollback`).
struct RollbackPlan {
    id: String,
    keys_to_remove: Vec<Vec<u8>>,
    remaining_head: u64,
    drop_snapshot: bool,
}

fn write_rollback_plan(
    events_tx: &TransactionalTree,
    snapshots_tx: &TransactionalTree,
    heads_tx: &TransactionalTree,
    plan: &RollbackPlan,
) -> ConflictableTransactionResult<(), StoreError> {
    for key in &plan.keys_to_remove {
        events_tx.remove(key.clone())?;
    }
    heads_tx.insert(plan.id.as_bytes(), &plan.remaining_head.to_be_bytes())?;
    if plan.drop_snapshot {
        snapshots_tx.remove(plan.id.as_bytes())?;
    }
    Ok(())
}

#[async_trait]
impl EventStore for SledEventStore {
    async fn get_one(
        &self,
        aggregate: &mut dyn Aggregate,
        _options: &AggregateOptions,
    ) -> Result<(), StoreError> {
        let snapshot = self.snapshot_for(aggregate.aggregate_id())?;
        let since_version = snapshot.as_ref().map(|s| s.version).unwrap_or(0);
        aggregate.reset();
        if let Some(snapshot) = snapshot {
            aggregate.restore_from(snapshot)?;
        }
        let tail: Vec<Event> = self
            .all_events_for(aggregate.aggregate_id())?
            .into_iter()
            .filter(|e| e.version > since_version)
            .collect();
        aggregate.load_from_history(&tail)?;
        Ok(())
    }

    async fn get_one_at(
        &self,
        aggregate: &mut dyn Aggregate,
        _options: &AggregateOptions,
        block_height: i64,
    ) -> Result<(), StoreError> {
        let snapshot = self.snapshot_for(aggregate.aggregate_id())?.filter(|s| s.block_height <= block_height);
        let since_version = snapshot.as_ref().map(|s| s.version).unwrap_or(0);
        let tail: Vec<Event> = self
            .all_events_for(aggregate.aggregate_id())?
            .into_iter()
            .filter(|e| e.version > since_version)
            .collect();
        aggregate.rollback_to(snapshot, &tail, block_height)?;
        Ok(())
    }

    async fn save(&self, items: &mut [SaveItem<'_>]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        for item in items.iter() {
            let pending = item.aggregate.uncommitted_events();
            let Some(first) = pending.first() else { continue };
            let current = self.head_version(item.aggregate.aggregate_id())?;
            if first.version != current + 1 {
                return Err(StoreError::Conflict {
                    aggregate_id: item.aggregate.aggregate_id().to_string(),
                    expected: current + 1,
                    actual: first.version,
                });
            }
        }

        let mut plans = Vec::with_capacity(items.len());
        for item in items.iter_mut() {
            if let Some(plan) = persist_plan(item.aggregate, item.options)? {
                plans.push(plan);
            }
        }

        (&self.events, &self.snapshots, &self.heads)
            .transaction(|(events_tx, snapshots_tx, heads_tx)| {
                for plan in &plans {
                    write_persist_plan(events_tx, snapshots_tx, heads_tx, plan)?;
                }
                Ok(())
            })
            .map_err(transaction_error)?;

        self.db.flush_async().await?;
        Ok(())
    }

    async fn rollback(
        &self,
        models_to_rollback: &[String],
        block_height: i64,
        models_to_save: &mut [SaveItem<'_>],
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        // Scanning a `Tree` isn't available on a `TransactionalTree`, so the
        // keys to drop are worked out up front (a plain read, safe to redo)
        // and only the writes below run inside the transaction.
        let mut rollback_plans = Vec::with_capacity(models_to_rollback.len());
        for id in models_to_rollback {
            let mut keys_to_remove = Vec::new();
            let mut remaining_head = 0u64;
            for kv in self.events.scan_prefix(Self::prefix(id)) {
                let (key, raw) = kv?;
                let event: Event = bincode::deserialize(&raw)?;
                if block_height < 0 || event.block_height > block_height {
                    keys_to_remove.push(key.to_vec());
                } else {
                    remaining_head = remaining_head.max(event.version);
                }
            }
            let drop_snapshot = match block_height {
                h if h < 0 => true,
                h => self.snapshot_for(id)?.is_some_and(|s| s.block_height > h),
            };
            rollback_plans.push(RollbackPlan { id: id.clone(), keys_to_remove, remaining_head, drop_snapshot });
        }

        let mut save_plans = Vec::with_capacity(models_to_save.len());
        for item in models_to_save.iter_mut() {
            if let Some(plan) = persist_plan(item.aggregate, item.options)? {
                save_plans.push(plan);
            }
        }

        (&self.events, &self.snapshots, &self.heads)
            .transaction(|(events_tx, snapshots_tx, heads_tx)| {
                for plan in &rollback_plans {
                    write_rollback_plan(events_tx, snapshots_tx, heads_tx, plan)?;
                }
                for plan in &save_plans {
                    write_persist_plan(events_tx, snapshots_tx, heads_tx, plan)?;
                }
                Ok(())
            })
            .map_err(transaction_error)?;

        self.db.flush_async().await?;
        Ok(())
    }

    async fn fetch_events(&self, aggregate_id: &str, filter: &EventFilter) -> Result<Vec<Event>, StoreError> {
        let mut events: Vec<Event> = self
            .all_events_for(aggregate_id)?
            .into_iter()
            .filter(|e| filter.block_height.is_none_or(|h| e.block_height == h))
            .filter(|e| filter.min_version.is_none_or(|v| e.version >= v))
            .filter(|e| filter.status.is_none_or(|s| e.status == s))
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
        let _guard = self.lock.lock().await;
        for &version in versions {
            let key = Self::event_key(aggregate_id, version);
            if let Some(raw) = self.events.get(&key)? {
                let mut event: Event = bincode::deserialize(&raw)?;
                event.status = EventStatus::Published;
                self.events.insert(key, bincode::serialize(&event)?)?;
            }
        }
        self.db.flush_async().await?;
        Ok(())
    }

    async fn unpublished_events(&self) -> Result<Vec<Event>, StoreError> {
        let mut out = Vec::new();
        for kv in self.events.iter() {
            let (_, raw) = kv?;
            let event: Event = bincode::deserialize(&raw)?;
            if event.status == EventStatus::Unpublished {
                out.push(event);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crawler_primitives::RequestId;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct Counter {
        id: String,
        version: u64,
        last_block_height: i64,
        uncommitted: Vec<Event>,
        total: i64,
    }

    impl Counter {
        fn new(id: &str) -> Self {
            Self { id: id.to_string(), last_block_height: crawler_aggregate::NO_BLOCK_HEIGHT, ..Default::default() }
        }
    }

    impl Aggregate for Counter {
        fn aggregate_id(&self) -> &str {
            &self.id
        }
        fn version(&self) -> u64 {
            self.version
        }
        fn last_block_height(&self) -> i64 {
            self.last_block_height
        }
        fn uncommitted_events(&self) -> &[Event] {
            &self.uncommitted
        }
        fn handle(&mut self, event: &Event) -> Result<(), crawler_aggregate::AggregateError> {
            self.total += event.payload["by"].as_i64().unwrap_or(0);
            Ok(())
        }
        fn serialize_user_state(&self) -> Result<Vec<u8>, crawler_aggregate::AggregateError> {
            Ok(self.total.to_le_bytes().to_vec())
        }
        fn restore_user_state(&mut self, bytes: &[u8]) -> Result<(), crawler_aggregate::AggregateError> {
            self.total = i64::from_le_bytes(bytes.try_into().unwrap());
            Ok(())
        }
        fn reset(&mut self) {
            self.version = 0;
            self.last_block_height = crawler_aggregate::NO_BLOCK_HEIGHT;
            self.uncommitted.clear();
            self.total = 0;
        }
        fn set_version(&mut self, version: u64) {
            self.version = version;
        }
        fn set_last_block_height(&mut self, height: i64) {
            self.last_block_height = height;
        }
        fn push_uncommitted(&mut self, event: Event) {
            self.uncommitted.push(event);
        }
        fn take_uncommitted(&mut self) -> Vec<Event> {
            std::mem::take(&mut self.uncommitted)
        }
    }

    #[tokio::test]
    async fn save_then_get_one_replays_state() {
        let store = SledEventStore::temporary().unwrap();
        let options = AggregateOptions::default();
        let mut counter = Counter::new("counter-1");
        counter.apply(RequestId::new(), "Incremented", 0, json!({"by": 4})).unwrap();
        counter.apply(RequestId::new(), "Incremented", 1, json!({"by": 1})).unwrap();
        store.save(&mut [SaveItem::new(&mut counter, &options)]).await.unwrap();

        let mut reloaded = Counter::new("counter-1");
        store.get_one(&mut reloaded, &options).await.unwrap();
        assert_eq!(reloaded.total, 5);
        assert_eq!(reloaded.version(), 2);
    }

    #[tokio::test]
    async fn conflicting_version_is_rejected() {
        let store = SledEventStore::temporary().unwrap();
        let options = AggregateOptions::default();
        let mut counter = Counter::new("counter-1");
        counter.apply(RequestId::new(), "Incremented", 0, json!({"by": 1})).unwrap();
        store.save(&mut [SaveItem::new(&mut counter, &options)]).await.unwrap();

        let mut stale = Counter::new("counter-1");
        stale.push_uncommitted(Event {
            aggregate_id: "counter-1".into(),
            version: 1,
            request_id: RequestId::new(),
            event_type: "Incremented".into(),
            block_height: 0,
            payload: json!({"by": 1}),
            status: EventStatus::Unpublished,
            timestamp: chrono::Utc::now(),
        });
        let err = store.save(&mut [SaveItem::new(&mut stale, &options)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn rollback_drops_events_past_the_target_height() {
        let store = SledEventStore::temporary().unwrap();
        let options = AggregateOptions::default();
        let mut counter = Counter::new("counter-1");
        for h in 0..5 {
            counter.apply(RequestId::new(), "Incremented", h, json!({"by": 1})).unwrap();
        }
        store.save(&mut [SaveItem::new(&mut counter, &options)]).await.unwrap();

        store.rollback(&["counter-1".to_string()], 2, &mut []).await.unwrap();

        let mut reloaded = Counter::new("counter-1");
        store.get_one(&mut reloaded, &options).await.unwrap();
        assert_eq!(reloaded.total, 3);
        assert_eq!(reloaded.version(), 3);
    }

    #[tokio::test]
    async fn mark_published_updates_status() {
        let store = SledEventStore::temporary().unwrap();
        let options = AggregateOptions::default();
        let mut counter = Counter::new("counter-1");
        counter.apply(RequestId::new(), "Incremented", 0, json!({"by": 1})).unwrap();
        store.save(&mut [SaveItem::new(&mut counter, &options)]).await.unwrap();

        assert_eq!(store.unpublished_events().await.unwrap().len(), 1);
        store.mark_published("counter-1", &[1]).await.unwrap();
        assert!(store.unpublished_events().await.unwrap().is_empty());
    }
}

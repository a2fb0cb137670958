use async_trait::async_trait;
use crawler_aggregate::{Aggregate, AggregateOptions, Event, EventStatus};

use crate::error::StoreError;

/// Filter accepted by [`EventStore::fetch_events`] (spec §6.4's
/// `FetchEventsQuery.filter`).
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub block_height: Option<i64>,
    pub min_version: Option<u64>,
    pub status: Option<EventStatus>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// One aggregate participating in a [`EventStore::save`] or
/// [`EventStore::rollback`] call, paired with the options that govern
/// its snapshot cadence.
pub struct SaveItem<'a> {
    pub aggregate: &'a mut dyn Aggregate,
    pub options: &'a AggregateOptions,
}

impl<'a> SaveItem<'a> {
    pub fn new(aggregate: &'a mut dyn Aggregate, options: &'a AggregateOptions) -> Self {
        Self { aggregate, options }
    }
}

/// The event store's contract (spec §4.3). All methods are atomic
/// with respect to the aggregates they touch; `save` and `rollback`
/// are each a single transaction spanning every aggregate passed in.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Loads `aggregate` to its current head: the latest snapshot (if
    /// any) followed by every event since, in ascending version
    /// order.
    async fn get_one(
        &self,
        aggregate: &mut dyn Aggregate,
        options: &AggregateOptions,
    ) -> Result<(), StoreError>;

    /// Loads `aggregate` as of `block_height`: the latest snapshot at
    /// or below that height, then events with `blockHeight <=
    /// block_height` (spec §4.1's `rollbackTo`, exposed here because
    /// only the store can answer "nearest snapshot at or below X").
    async fn get_one_at(
        &self,
        aggregate: &mut dyn Aggregate,
        options: &AggregateOptions,
        block_height: i64,
    ) -> Result<(), StoreError>;

    /// Atomically drains and persists the uncommitted events of every
    /// aggregate in `items`. Fails the whole batch with
    /// [`StoreError::Conflict`] if any aggregate's next event version
    /// doesn't match `current_stored_version + 1`. Aggregates that
    /// cross a snapshot boundary get a snapshot row written in the
    /// same transaction.
    async fn save(&self, items: &mut [SaveItem<'_>]) -> Result<(), StoreError>;

    /// Atomically deletes all events (and snapshots) with
    /// `blockHeight > block_height` for every aggregate id in
    /// `models_to_rollback` (or everything, if `block_height == -1`),
    /// then persists the uncommitted events of `models_to_save` in
    /// the same transaction (spec §4.3's `rollback`).
    async fn rollback(
        &self,
        models_to_rollback: &[String],
        block_height: i64,
        models_to_save: &mut [SaveItem<'_>],
    ) -> Result<(), StoreError>;

    /// Returns events for `aggregate_id` matching `filter`, in
    /// ascending version order (spec §6.4's `FetchEventsQuery`).
    async fn fetch_events(
        &self,
        aggregate_id: &str,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, StoreError>;

    /// Marks a batch of events `PUBLISHED` after the transport has
    /// accepted delivery (spec §4.3 step 4, at-least-once).
    async fn mark_published(&self, aggregate_id: &str, versions: &[u64]) -> Result<(), StoreError>;

    /// Returns every event still `UNPUBLISHED`, across all
    /// aggregates, in no particular cross-aggregate order. Used by
    /// the publisher to re-deliver events that were committed but
    /// never acknowledged before a crash (spec scenario S5).
    async fn unpublished_events(&self) -> Result<Vec<Event>, StoreError>;
}

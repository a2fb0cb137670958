//! Base runtime shared by every aggregate (the network aggregate, the
//! mempool aggregate, and every user model). An aggregate is a
//! consistency boundary whose state evolves only by applying events
//! through a per-type handler; see the module docs on [`Aggregate`].

mod error;
mod event;
mod options;

pub use error::AggregateError;
pub use event::{Event, EventStatus, Snapshot};
pub use options::AggregateOptions;

use crawler_primitives::RequestId;

/// Height recorded on an aggregate or event that isn't tied to any
/// block yet.
pub const NO_BLOCK_HEIGHT: i64 = -1;

/// The event-sourced aggregate contract (spec §4.1).
///
/// Implementers hold their own state privately and expose it through
/// narrow accessors; this trait only governs how that state is
/// mutated. The four methods below are the only ones a concrete
/// aggregate must write; `apply`, `commit`, `load_from_history`,
/// `rollback_to` and `snapshot` are provided and share one
/// invariant-preserving implementation.
pub trait Aggregate {
    /// Stable, unique identifier for this aggregate instance (e.g.
    /// `"network"`, or a user model's `modelId`).
    fn aggregate_id(&self) -> &str;

    /// Current (monotonic, gap-free) version.
    fn version(&self) -> u64;

    /// Height of the most recent block-carrying event, or
    /// [`NO_BLOCK_HEIGHT`] if none has been applied yet.
    fn last_block_height(&self) -> i64;

    /// Events produced since the last `commit`, in application order.
    fn uncommitted_events(&self) -> &[Event];

    /// Dispatches `event` to the matching `on<EventType>` handler and
    /// mutates state accordingly. Must be deterministic and
    /// idempotent: calling it during live `apply` or during replay
    /// must produce identical state. Must never mutate `version` or
    /// `last_block_height` itself — the caller (this trait's provided
    /// methods) owns those.
    fn handle(&mut self, event: &Event) -> Result<(), AggregateError>;

    /// Serializes the user-owned portion of state (not `version` or
    /// `last_block_height`, which the snapshot envelope carries
    /// separately).
    fn serialize_user_state(&self) -> Result<Vec<u8>, AggregateError>;

    /// Restores the user-owned portion of state from a previously
    /// serialized snapshot.
    fn restore_user_state(&mut self, bytes: &[u8]) -> Result<(), AggregateError>;

    /// Discards all in-memory state (user state and bookkeeping),
    /// returning the aggregate to its pre-init condition. Used before
    /// `rollback_to` replays a bounded history.
    fn reset(&mut self);

    /// Bookkeeping hooks `apply`/`load_from_history` use to advance
    /// `version`/`last_block_height` and buffer uncommitted events.
    /// Exposed so the provided methods below can be written once
    /// against any aggregate.
    fn set_version(&mut self, version: u64);
    fn set_last_block_height(&mut self, height: i64);
    fn push_uncommitted(&mut self, event: Event);
    fn take_uncommitted(&mut self) -> Vec<Event>;

    /// Appends a new event: assigns it the next version, invokes its
    /// handler synchronously, then buffers it as uncommitted.
    ///
    /// A handler error aborts the live apply — per spec §4.1/§4.5 the
    /// whole batch is discarded and may be retried; no partial state
    /// change is visible because the version/height bump only happens
    /// after `handle` succeeds.
    fn apply(
        &mut self,
        request_id: RequestId,
        event_type: &str,
        block_height: i64,
        payload: serde_json::Value,
    ) -> Result<(), AggregateError> {
        let version = self.version() + 1;
        let event = Event {
            aggregate_id: self.aggregate_id().to_string(),
            version,
            request_id,
            event_type: event_type.to_string(),
            block_height,
            payload,
            status: EventStatus::Unpublished,
            timestamp: chrono::Utc::now(),
        };
        self.handle(&event)?;
        self.set_version(version);
        self.set_last_block_height(block_height);
        self.push_uncommitted(event);
        Ok(())
    }

    /// Drains and returns the uncommitted buffer; `version` is left
    /// intact (the events already carry the versions they were
    /// assigned).
    fn commit(&mut self) -> Vec<Event> {
        self.take_uncommitted()
    }

    /// Replays `events` in ascending version order without touching
    /// the uncommitted buffer. A handler error here is fatal
    /// corruption (spec §4.1, §7) — the caller should treat it as
    /// unrecoverable, not retryable.
    fn load_from_history(&mut self, events: &[Event]) -> Result<(), AggregateError> {
        for event in events {
            self.handle(event)
                .map_err(|e| AggregateError::ReplayFailed(Box::new(e)))?;
            self.set_version(event.version);
            self.set_last_block_height(event.block_height);
        }
        Ok(())
    }

    /// Discards in-memory state, restores `snapshot` if one is given,
    /// then replays `events` filtered to `blockHeight <= target`
    /// (spec §4.1's `rollbackTo`). `events` must already be in
    /// ascending version order and cover everything after the
    /// snapshot's version; the caller (the event store) is
    /// responsible for fetching the right slice.
    fn rollback_to(
        &mut self,
        snapshot: Option<Snapshot>,
        events: &[Event],
        target_block_height: i64,
    ) -> Result<(), AggregateError> {
        self.reset();
        if let Some(snapshot) = snapshot {
            self.restore_from(snapshot)?;
        }
        let in_range: Vec<Event> = events
            .iter()
            .filter(|e| e.block_height <= target_block_height)
            .cloned()
            .collect();
        self.load_from_history(&in_range)
    }

    /// Serializes the full aggregate state (version, last block
    /// height, and user state) into a snapshot row.
    fn snapshot(&self) -> Result<Snapshot, AggregateError> {
        Ok(Snapshot {
            aggregate_id: self.aggregate_id().to_string(),
            version: self.version(),
            block_height: self.last_block_height(),
            state: self.serialize_user_state()?,
        })
    }

    /// Restores `version`, `last_block_height` and user state from a
    /// snapshot row.
    fn restore_from(&mut self, snapshot: Snapshot) -> Result<(), AggregateError> {
        self.restore_user_state(&snapshot.state)?;
        self.set_version(snapshot.version);
        self.set_last_block_height(snapshot.block_height);
        Ok(())
    }
}

/// Whether a save at `version` should trigger a snapshot (spec §4.1's
/// snapshot trigger, evaluated by the event store at save time).
pub fn crosses_snapshot_boundary(options: &AggregateOptions, version: u64) -> bool {
    options.snapshots_enabled && options.snapshot_interval > 0 && version % options.snapshot_interval == 0
}

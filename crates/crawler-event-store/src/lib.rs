//! The append-only, per-aggregate event log (spec §4.3). Two
//! implementations ship: [`SledEventStore`] (the default, durable
//! backend, grounded on the teacher's `strata-db-store-sled`) and
//! [`InMemoryEventStore`] (used across the workspace's tests).

mod error;
mod in_memory;
mod sled_store;
mod traits;

pub use error::StoreError;
pub use in_memory::InMemoryEventStore;
pub use sled_store::SledEventStore;
pub use traits::{EventFilter, EventStore, SaveItem};

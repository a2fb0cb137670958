//! The network aggregate (spec §4.2): the single source of truth for
//! "what is the chain, as far as we've indexed it". Every block the
//! pipeline processes passes through here first; a hash mismatch
//! against the retained tip is how reorgs are detected.

mod aggregate;
mod error;
mod events;
mod service;

pub use aggregate::{InitOutcome, NetworkAggregate, AGGREGATE_ID};
pub use error::NetworkAggregateError;
pub use events::{
    NetworkBlocksAdded, NetworkCleared, NetworkInitialized, NetworkReorganized,
    EVENT_NETWORK_BLOCKS_ADDED, EVENT_NETWORK_CLEARED, EVENT_NETWORK_INITIALIZED, EVENT_NETWORK_REORGANIZED,
};
pub use service::ForkLookup;

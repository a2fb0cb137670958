//! Transport-facing seam: the [`EventPublisher`] trait the event
//! store drives post-commit, plus the typed query/response shapes an
//! external frontend (HTTP, WebSocket, RPC) would serve over its own
//! wire protocol. This crate never listens on a socket.

mod error;
mod publisher;
mod query;

pub use error::TransportError;
pub use publisher::{ChannelPublisher, EventPublisher};
pub use query::{FetchEventsFilter, FetchEventsQuery, GetModelsFilter, GetModelsQuery, Paging};

//! Shared types passed between the node provider, blocks queue, network
//! aggregate and pipeline.

mod block;
mod network_config;
mod request_id;

pub use block::{FullBlock, LightBlock};
pub use network_config::{Network, NetworkConfig};
pub use request_id::RequestId;

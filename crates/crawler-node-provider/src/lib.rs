//! The node-facing RPC adapter (spec §6.2): a rate-limited,
//! multi-URL-failover wrapper around a Bitcoin Core JSON-RPC client.

mod bitcoind;
mod error;
mod fork_lookup;
mod rate_limit;
mod traits;
mod types;

pub use bitcoind::{BitcoindProvider, BitcoindProviderConfig};
pub use error::NodeProviderError;
pub use rate_limit::RateLimitConfig;
pub use traits::NodeProvider;
pub use types::{BlockStats, MempoolTransaction};

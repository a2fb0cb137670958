use thiserror::Error;

/// Errors raised by a [`crate::NodeProvider`] implementation.
#[derive(Debug, Error)]
pub enum NodeProviderError {
    /// Every configured RPC URL failed for this call (spec §6.2's
    /// `PROVIDER_NETWORK_RPC_URLS` failover list exhausted).
    #[error("all {tried} configured RPC endpoints failed; last error: {last}")]
    AllEndpointsFailed { tried: usize, last: String },

    #[error("RPC call exceeded its response timeout")]
    Timeout,

    #[error("rpc error: {0}")]
    Rpc(String),
}

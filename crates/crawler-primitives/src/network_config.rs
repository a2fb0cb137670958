use serde::{Deserialize, Serialize};

/// Which Bitcoin network the crawler is following. Distinct from
/// [`bitcoin::Network`] so the wire-stable config surface (§6.5 of the
/// spec) doesn't change if `bitcoin`'s enum grows variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
    Signet,
}

impl From<Network> for bitcoin::Network {
    fn from(n: Network) -> Self {
        match n {
            Network::Mainnet => bitcoin::Network::Bitcoin,
            Network::Testnet => bitcoin::Network::Testnet,
            Network::Regtest => bitcoin::Network::Regtest,
            Network::Signet => bitcoin::Network::Signet,
        }
    }
}

/// Read-only network parameters handed to every user model invocation via
/// `ctx.networkConfig` (spec §6.1). Feature flags describe what the
/// network supports; the core never branches on them itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network: Network,
    pub native_currency_symbol: String,
    pub native_currency_decimals: u8,
    pub has_segwit: bool,
    pub has_taproot: bool,
    pub has_rbf: bool,
    pub has_csv: bool,
    pub has_cltv: bool,
    pub max_block_size: u64,
    pub max_block_weight: u64,
    pub difficulty_adjustment_interval: u64,
    pub target_block_time_secs: u64,
}

impl NetworkConfig {
    pub fn for_network(network: Network) -> Self {
        Self {
            network,
            native_currency_symbol: "BTC".to_string(),
            native_currency_decimals: 8,
            has_segwit: true,
            has_taproot: true,
            has_rbf: true,
            has_csv: true,
            has_cltv: true,
            max_block_size: 4_000_000,
            max_block_weight: 4_000_000,
            difficulty_adjustment_interval: 2016,
            target_block_time_secs: 600,
        }
    }
}

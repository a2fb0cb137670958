use crawler_primitives::LightBlock;
use serde::{Deserialize, Serialize};

pub const EVENT_NETWORK_INITIALIZED: &str = "NetworkInitialized";
pub const EVENT_NETWORK_BLOCKS_ADDED: &str = "NetworkBlocksAdded";
pub const EVENT_NETWORK_REORGANIZED: &str = "NetworkReorganized";
pub const EVENT_NETWORK_CLEARED: &str = "NetworkCleared";

/// Spec §6.3 wire-stable payload for `NetworkInitialized`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInitialized {
    pub start_height: i64,
}

/// Spec §6.3 wire-stable payload for `NetworkBlocksAdded`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkBlocksAdded {
    pub blocks: Vec<LightBlock>,
}

/// Spec §6.3 wire-stable payload for `NetworkReorganized`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkReorganized {
    pub reorg_height: u64,
    pub truncated: Vec<LightBlock>,
}

/// Spec §6.3 wire-stable payload for `NetworkCleared`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NetworkCleared {}

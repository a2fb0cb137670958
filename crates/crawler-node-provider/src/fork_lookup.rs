use async_trait::async_trait;
use bitcoin::BlockHash;
use crawler_network::ForkLookup;

use crate::traits::NodeProvider;

/// Any [`NodeProvider`] can answer the network aggregate's reorg
/// fork-point search; this blanket impl is how the pipeline wires the
/// two crates together without `crawler-network` depending on the RPC
/// client stack.
#[async_trait]
impl<T: NodeProvider + ?Sized> ForkLookup for T {
    async fn block_hash_at_height(&self, height: u64) -> Result<BlockHash, String> {
        self.get_block_hash_at_height(height).await.map_err(|e| e.to_string())
    }
}

use async_trait::async_trait;
use bitcoin::BlockHash;

/// The minimal collaborator `reorganisation` needs: the canonical hash
/// at a given height, straight from the node (spec §4.2's
/// `service.getBlockByHeight`). A thin slice of the full node provider
/// (§6.2), kept local so this crate doesn't depend on the RPC client
/// stack — the pipeline adapts its `NodeProvider` to this trait.
#[async_trait]
pub trait ForkLookup: Send + Sync {
    async fn block_hash_at_height(&self, height: u64) -> Result<BlockHash, String>;
}

use async_trait::async_trait;
use crawler_node_provider::NodeProvider;

/// Decides which heights the loader should fetch next (spec §4.4). A
/// trait object so a third strategy can be added without touching the
/// loader loop (Open Question decision, see `DESIGN.md`).
#[async_trait]
pub trait LoaderStrategy: Send + Sync {
    /// `loaded_up_to` is the highest height already queued or reserved;
    /// `max_batch` bounds the returned vec's length. Returns an empty
    /// vec when there is nothing new to fetch yet.
    async fn next_heights(
        &self,
        loaded_up_to: i64,
        max_batch: usize,
        node: &dyn NodeProvider,
    ) -> Result<Vec<u64>, crawler_node_provider::NodeProviderError>;
}

/// Requests `[loaded_up_to+1 ..= loaded_up_to+max_batch]` unconditionally,
/// trusting the node to error on heights past its tip. Matches spec
/// §4.4's "sequential" strategy.
#[derive(Debug, Default)]
pub struct Sequential;

#[async_trait]
impl LoaderStrategy for Sequential {
    async fn next_heights(
        &self,
        loaded_up_to: i64,
        max_batch: usize,
        _node: &dyn NodeProvider,
    ) -> Result<Vec<u64>, crawler_node_provider::NodeProviderError> {
        let start = loaded_up_to + 1;
        Ok((start..start + max_batch as i64).map(|h| h as u64).collect())
    }
}

/// Polls the node's current tip first and only requests heights known
/// to exist, bounded by both `max_batch` and the node's reported tip.
/// Matches spec §4.4's "pull-network" strategy.
#[derive(Debug, Default)]
pub struct PullNetwork;

#[async_trait]
impl LoaderStrategy for PullNetwork {
    async fn next_heights(
        &self,
        loaded_up_to: i64,
        max_batch: usize,
        node: &dyn NodeProvider,
    ) -> Result<Vec<u64>, crawler_node_provider::NodeProviderError> {
        let tip = node.get_current_block_height_from_network().await? as i64;
        if tip <= loaded_up_to {
            return Ok(Vec::new());
        }
        let available = (tip - loaded_up_to) as usize;
        let count = available.min(max_batch);
        let start = loaded_up_to + 1;
        Ok((start..start + count as i64).map(|h| h as u64).collect())
    }
}

use async_trait::async_trait;
use crawler_mempool::MempoolAggregate;
use crawler_network::NetworkAggregate;
use crawler_node_provider::NodeProvider;
use crawler_primitives::{FullBlock, NetworkConfig};

/// Read-only lookup of another user model's current projection, for
/// the rare model that needs to read a sibling model's state within
/// the same batch (spec §6.1's `services.userModelService`). The
/// pipeline implements this over whichever models it has instantiated
/// for the batch; this crate never sees the concrete set.
#[async_trait]
pub trait UserModelService: Send + Sync {
    /// `None` if no model with `model_id` is part of the current
    /// batch, or if it declines a JSON projection.
    async fn model_snapshot(&self, model_id: &str) -> Option<serde_json::Value>;
}

/// The collaborators a model may call out to during `process_block`
/// (spec §6.1's `ctx.services`).
pub struct ModelServices<'a> {
    pub node_provider: &'a dyn NodeProvider,
    pub network: &'a NetworkAggregate,
    pub user_models: &'a dyn UserModelService,
}

/// The argument handed to [`crate::UserModel::process_block`]. `block`
/// is immutable for the call's duration; nothing in this type allows
/// mutating it.
pub struct BlockContext<'a> {
    pub block: &'a FullBlock,
    pub network_config: &'a NetworkConfig,
    pub services: ModelServices<'a>,
    pub mempool: Option<&'a MempoolAggregate>,
}

use async_trait::async_trait;
use crawler_aggregate::Aggregate;

use crate::{context::BlockContext, error::UserModelError};

/// The contract external model authors implement (spec §6.1). A user
/// model is an [`Aggregate`] (its `aggregate_id` is the stable
/// `modelId`) plus one async entry point the pipeline drives per
/// block. `on<EventType>` handlers are `Aggregate::handle`; custom
/// serialization is `Aggregate::serialize_user_state`/
/// `restore_user_state` for the binary snapshot, and
/// [`UserModel::to_json_payload`] for the optional query-surface
/// projection.
#[async_trait]
pub trait UserModel: Aggregate + Send {
    /// Applies `ctx.block` to this model's state, emitting domain
    /// events via `Aggregate::apply`. May suspend (RPC calls, reading
    /// sibling models); must not mutate `ctx.block` or any other
    /// model's state directly.
    async fn process_block(&mut self, ctx: &BlockContext<'_>) -> Result<(), UserModelError>;

    /// Optional JSON projection for `GetModelsQuery` (spec §6.4).
    /// Defaults to `None`, in which case callers fall back to the
    /// binary snapshot from `Aggregate::serialize_user_state`.
    fn to_json_payload(&self) -> Option<serde_json::Value> {
        None
    }

    /// Narrows `&mut dyn UserModel` to `&mut dyn Aggregate`, for
    /// passing into `EventStore` calls without the store needing to
    /// know about `UserModel`. Always `{ self }`; can't be a default
    /// method because `dyn UserModel` to `dyn Aggregate` upcasting
    /// isn't available on every toolchain this workspace targets, so
    /// each implementer spells out the plain `&mut Self` coercion by
    /// hand.
    fn as_aggregate_mut(&mut self) -> &mut dyn Aggregate;

    /// Shared-reference counterpart of [`UserModel::as_aggregate_mut`].
    fn as_aggregate(&self) -> &dyn Aggregate;
}

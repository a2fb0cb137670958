use crawler_aggregate::Aggregate;
use crawler_event_store::{EventStore, SaveItem};
use crawler_network::{NetworkReorganized, EVENT_NETWORK_REORGANIZED};
use crawler_node_provider::NodeProvider;
use crawler_primitives::RequestId;

use crate::{error::PipelineError, state::PipelineState};

/// Spec §4.5's reorg path: walk the network aggregate back to the last
/// common ancestor, reinsert the orphaned transactions into the
/// mempool (if configured), then roll every user model back to the
/// fork height in both the store and in memory. The batch that
/// triggered this is never confirmed on the blocks queue — it replays
/// from the new tip forward.
pub(crate) async fn handle_reorg(
    state: &mut PipelineState,
    node: &dyn NodeProvider,
    event_store: &dyn EventStore,
    request_id: RequestId,
) -> Result<u64, PipelineError> {
    let fork_height = state.network.reorganisation(request_id, node).await?;

    let orphaned_txids: Vec<bitcoin::Txid> = state
        .network
        .uncommitted_events()
        .iter()
        .find(|e| e.event_type == EVENT_NETWORK_REORGANIZED)
        .and_then(|e| serde_json::from_value::<NetworkReorganized>(e.payload.clone()).ok())
        .map(|reorged| reorged.truncated.into_iter().flat_map(|b| b.tx).collect())
        .unwrap_or_default();

    if let Some(mempool) = state.mempool.as_mut() {
        mempool.process_reorganisation(request_id, node, &orphaned_txids).await?;
    }

    let model_ids: Vec<String> = state.models.iter().map(|entry| entry.model.aggregate_id().to_string()).collect();

    let mut save_items = vec![SaveItem::new(&mut state.network, &state.network_options)];
    if let Some(mempool) = state.mempool.as_mut() {
        save_items.push(SaveItem::new(mempool, &state.mempool_options));
    }
    event_store.rollback(&model_ids, fork_height as i64, &mut save_items).await?;

    for entry in state.models.iter_mut() {
        event_store.get_one_at(entry.model.as_aggregate_mut(), &entry.options, fork_height as i64).await?;
    }

    Ok(fork_height)
}

use bitcoin::BlockHash;
use crawler_event_store::{EventStore, SaveItem};
use crawler_models::{BlockContext, ModelServices};
use crawler_network::NetworkAggregateError;
use crawler_node_provider::NodeProvider;
use crawler_primitives::{FullBlock, LightBlock, NetworkConfig, RequestId};

use crate::{error::PipelineError, reorg, registry::ModelSnapshots, state::PipelineState};

/// What processing a `ReservedBatch` did. `confirmed_hashes` is empty
/// exactly when a reorg was detected and handled instead — the caller
/// must not confirm that batch on the blocks queue in that case, and
/// should instead reset the queue to `reorg_fork_height`.
#[derive(Debug)]
pub struct BatchOutcome {
    pub confirmed_hashes: Vec<BlockHash>,
    pub reorg_fork_height: Option<u64>,
}

/// Spec §4.5's `AddBlocksBatch`: extends the network aggregate, runs
/// every block through every user model (and, if configured, the
/// mempool), then commits all of it atomically. A tip mismatch from
/// `NetworkAggregate::add_blocks` switches to the reorg path instead —
/// nothing from this batch is saved in that case.
pub async fn process_batch(
    state: &mut PipelineState,
    node: &dyn NodeProvider,
    event_store: &dyn EventStore,
    network_config: &NetworkConfig,
    blocks: &[FullBlock],
) -> Result<BatchOutcome, PipelineError> {
    if blocks.is_empty() {
        return Ok(BatchOutcome { confirmed_hashes: Vec::new(), reorg_fork_height: None });
    }

    let request_id = RequestId::new();
    let light_blocks: Vec<LightBlock> = blocks.iter().map(LightBlock::from_full).collect();

    match state.network.add_blocks(request_id, &light_blocks) {
        Ok(()) => {}
        Err(NetworkAggregateError::BlockchainValidation { .. }) => {
            let fork_height = reorg::handle_reorg(state, node, event_store, request_id).await?;
            return Ok(BatchOutcome { confirmed_hashes: Vec::new(), reorg_fork_height: Some(fork_height) });
        }
        Err(e) => return Err(e.into()),
    }

    for block in blocks {
        if let Some(mempool) = state.mempool.as_mut() {
            let confirmed: Vec<bitcoin::Txid> = block.block.txdata.iter().map(|tx| tx.compute_txid()).collect();
            mempool.process_blocks_batch(request_id, block.height as i64, &confirmed);
        }

        let snapshots = ModelSnapshots::capture(&state.models);

        for entry in state.models.iter_mut() {
            let ctx = BlockContext {
                block,
                network_config,
                services: ModelServices { node_provider: node, network: &state.network, user_models: &snapshots },
                mempool: state.mempool.as_ref(),
            };
            entry.model.process_block(&ctx).await?;
        }
    }

    let mut save_items: Vec<SaveItem<'_>> = state
        .models
        .iter_mut()
        .map(|entry| SaveItem::new(entry.model.as_aggregate_mut(), &entry.options))
        .collect();
    save_items.push(SaveItem::new(&mut state.network, &state.network_options));
    if let Some(mempool) = state.mempool.as_mut() {
        save_items.push(SaveItem::new(mempool, &state.mempool_options));
    }

    event_store.save(&mut save_items).await?;

    Ok(BatchOutcome { confirmed_hashes: blocks.iter().map(|b| b.block_hash()).collect(), reorg_fork_height: None })
}

use std::sync::Arc;

use crawler_aggregate::Aggregate;
use crawler_blocks_queue::BlocksQueueHandle;
use crawler_event_store::{EventStore, SaveItem};
use crawler_node_provider::NodeProvider;
use crawler_primitives::RequestId;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{batch, config::PipelineConfig, state::PipelineState};

/// The pipeline task: pulls reserved batches off the blocks queue and
/// drives each through [`batch::process_batch`], confirming on
/// success or resetting the queue on a detected reorg. Grounded on
/// `alpen_ee_sequencer::batch_lifecycle::task`'s
/// `loop { select! { ...; poll_interval.tick() => {} } }` shape,
/// adapted to poll the blocks queue instead of a batch storage
/// backend.
///
/// `mempool_node` drives the mempool's own sync ticks (spec §4.6) on
/// `config.mempool_sync_interval` in the same loop that owns
/// `state.mempool`, so the two never race over the same in-memory
/// aggregate or its event stream.
pub(crate) async fn run(
    mut state: PipelineState,
    node: Arc<dyn NodeProvider>,
    mempool_node: Option<Arc<dyn NodeProvider>>,
    event_store: Arc<dyn EventStore>,
    queue: BlocksQueueHandle,
    config: PipelineConfig,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut mempool_sync_ticker = config.mempool_sync_interval.map(tokio::time::interval);

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let reserved = tokio::select! {
            biased;
            reserved = queue.next_batch(config.iterator_batch_size) => reserved,
            _ = async { mempool_sync_ticker.as_mut().expect("guarded by is_some above").tick().await },
                if mempool_sync_ticker.is_some() => {
                if let (Some(mempool_node), Some(mempool)) = (mempool_node.as_ref(), state.mempool.as_mut()) {
                    sync_mempool(mempool, mempool_node.as_ref(), event_store.as_ref(), &state.mempool_options).await;
                }
                continue;
            }
        };
        if reserved.blocks.is_empty() {
            if queue.is_exhausted(config.max_block_height).await {
                info!("reached the configured max block height, stopping cleanly");
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(config.idle_poll_interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() || *stop_rx.borrow() {
                        break;
                    }
                }
            }
            continue;
        }

        let outcome =
            batch::process_batch(&mut state, node.as_ref(), event_store.as_ref(), &config.network_config, &reserved.blocks).await;

        match outcome {
            Ok(outcome) => match outcome.reorg_fork_height {
                Some(fork_height) => {
                    warn!(fork_height, "reorg handled, resetting blocks queue");
                    queue.reset(fork_height as i64).await;
                }
                None => {
                    queue.confirm_processed_batch(&outcome.confirmed_hashes).await;
                }
            },
            Err(e) => {
                error!(error = %e, "failed to process batch, releasing it back to the queue for retry");
                let hashes: Vec<bitcoin::BlockHash> = reserved.blocks.iter().map(|b| b.block_hash()).collect();
                queue.release_batch(&hashes).await;
            }
        }
    }

    info!("pipeline task stopped");
}

/// Runs one mempool sync tick and persists it on its own, outside the
/// block-batch save — `init` on the very first tick (no events yet),
/// `processSync` after that.
async fn sync_mempool(
    mempool: &mut crawler_mempool::MempoolAggregate,
    node: &dyn NodeProvider,
    event_store: &dyn EventStore,
    options: &crawler_aggregate::AggregateOptions,
) {
    let result = if mempool.version() == 0 {
        match node.list_mempool_txids().await {
            Ok(txids) => match node.get_mempool_transactions_verbose(&txids).await {
                Ok(verbose) => {
                    let entries = verbose
                        .into_iter()
                        .map(|tx| crawler_mempool::MempoolTxMeta {
                            txid: tx.txid,
                            vsize: tx.vsize,
                            fee_sat: tx.fee_sat,
                            modified_fee_sat: None,
                            time: tx.time,
                            provider: "node".to_string(),
                        })
                        .collect();
                    mempool.init(RequestId::new(), entries).map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        }
    } else {
        mempool.process_sync(RequestId::new(), node).await.map_err(|e| e.to_string())
    };

    if let Err(e) = result {
        warn!(error = %e, "mempool sync failed");
        return;
    }

    let mut items = [SaveItem::new(mempool, options)];
    if let Err(e) = event_store.save(&mut items).await {
        warn!(error = %e, "failed to persist mempool sync");
    }
}

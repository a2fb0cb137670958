use std::sync::Arc;

use crawler_node_provider::NodeProvider;
use tokio::sync::{watch, Mutex, Notify};
use tracing::warn;

use crate::{
    backoff::Backoff,
    config::BlocksQueueConfig,
    state::{QueuePhase, QueueState},
};

/// The loader task body. Runs until `stop_rx` observes `true`, fetching
/// ahead of the iterator per the configured [`LoaderStrategy`][crate::LoaderStrategy]
/// and backing off on RPC failure. Grounded on
/// `alpen_ee_sequencer::batch_builder::task::batch_builder_task`'s
/// `loop { select! { ... } }` shape.
pub async fn run(
    state: Arc<Mutex<QueueState>>,
    wake_loader: Arc<Notify>,
    phase_tx: Arc<watch::Sender<QueuePhase>>,
    mut stop_rx: watch::Receiver<bool>,
    node: Arc<dyn NodeProvider>,
    config: BlocksQueueConfig,
) {
    let _ = phase_tx.send(QueuePhase::Starting);
    let mut backoff = Backoff::default();
    let _ = phase_tx.send(QueuePhase::Running);

    loop {
        if *stop_rx.borrow() {
            break;
        }

        let loaded_up_to = {
            let guard = state.lock().await;
            let caught_up_to_max = config.max_height.is_some_and(|max_height| guard.loaded_up_to >= max_height as i64);
            if !guard.has_capacity() || caught_up_to_max {
                drop(guard);
                tokio::select! {
                    _ = wake_loader.notified() => {}
                    _ = tokio::time::sleep(config.idle_poll_interval), if caught_up_to_max => {}
                    _ = stop_rx.changed() => {}
                }
                continue;
            }
            guard.loaded_up_to
        };

        let requested_batch_size = match config.max_height {
            Some(max_height) => {
                let remaining = (max_height as i64 - loaded_up_to).max(0) as usize;
                config.loader_request_batch_size.min(remaining)
            }
            None => config.loader_request_batch_size,
        };

        match config.strategy.next_heights(loaded_up_to, requested_batch_size, node.as_ref()).await {
            Ok(heights) if heights.is_empty() => {
                tokio::select! {
                    _ = tokio::time::sleep(config.idle_poll_interval) => {}
                    _ = stop_rx.changed() => {}
                }
            }
            Ok(heights) => match node.get_many_blocks_by_heights(&heights).await {
                Ok(blocks) => {
                    let mut guard = state.lock().await;
                    guard.push_loaded(blocks);
                    drop(guard);
                    backoff.reset();
                }
                Err(e) => {
                    warn!(err = %e, "blocks queue loader fetch failed, backing off");
                    let delay = backoff.next_delay();
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = stop_rx.changed() => {}
                    }
                }
            },
            Err(e) => {
                warn!(err = %e, "blocks queue strategy lookup failed, backing off");
                let delay = backoff.next_delay();
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop_rx.changed() => {}
                }
            }
        }
    }

    let _ = phase_tx.send(QueuePhase::Stopped);
}

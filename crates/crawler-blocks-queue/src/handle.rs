use std::sync::Arc;

use bitcoin::BlockHash;
use crawler_primitives::FullBlock;
use tokio::sync::{watch, Mutex, Notify};

use crate::state::{QueuePhase, QueueState};

/// A batch of contiguous blocks dispatched to the iterator side, still
/// pending `confirm_processed_batch`.
#[derive(Debug)]
pub struct ReservedBatch {
    pub blocks: Vec<FullBlock>,
}

/// Handle shared between the loader task and whatever drives the
/// iterator side (the pipeline). Cloning is cheap; all clones see the
/// same underlying queue. Grounded on
/// `alpen_ee_sequencer::batch_builder::handle::BatchBuilderHandle`'s
/// `watch`-channel-plus-shared-state shape.
#[derive(Clone)]
pub struct BlocksQueueHandle {
    pub(crate) state: Arc<Mutex<QueueState>>,
    pub(crate) wake_loader: Arc<Notify>,
    pub(crate) phase_tx: Arc<watch::Sender<QueuePhase>>,
    pub(crate) phase_rx: watch::Receiver<QueuePhase>,
    pub(crate) stop_tx: Arc<watch::Sender<bool>>,
}

impl BlocksQueueHandle {
    pub fn phase(&self) -> QueuePhase {
        *self.phase_rx.borrow()
    }

    pub fn phase_watcher(&self) -> watch::Receiver<QueuePhase> {
        self.phase_rx.clone()
    }

    /// Dequeues up to `batch_size` contiguous blocks. Returns an empty
    /// batch if nothing is queued yet; callers poll or await
    /// `phase_watcher()` changes.
    pub async fn next_batch(&self, batch_size: usize) -> ReservedBatch {
        let mut state = self.state.lock().await;
        let was_at_capacity = !state.has_capacity();
        let blocks = state.take_batch(batch_size);
        drop(state);
        if was_at_capacity {
            self.wake_loader.notify_one();
        }
        ReservedBatch { blocks }
    }

    /// Confirms a previously-dequeued batch by block hash, freeing its
    /// queue capacity and letting the loader resume.
    pub async fn confirm_processed_batch(&self, hashes: &[BlockHash]) {
        let mut state = self.state.lock().await;
        state.confirm(hashes);
        drop(state);
        self.wake_loader.notify_one();
    }

    /// Returns a previously-dequeued batch to the front of the pending
    /// queue instead of confirming it, so the next `next_batch` call
    /// re-dispatches the same blocks. Used when processing a batch
    /// failed (spec §7's save-conflict case: "aborts the batch;
    /// iterator will re-dispatch").
    pub async fn release_batch(&self, hashes: &[BlockHash]) {
        let mut state = self.state.lock().await;
        state.release(hashes);
        drop(state);
        self.wake_loader.notify_one();
    }

    /// Discards queued work past `new_tip` and rewinds the loader's
    /// cursor, for the reorg `Draining -> Reset(newTip) -> Running`
    /// transition.
    pub async fn reset(&self, new_tip: i64) {
        let _ = self.phase_tx.send(QueuePhase::Draining);
        let mut state = self.state.lock().await;
        state.reset_to(new_tip);
        drop(state);
        let _ = self.phase_tx.send(QueuePhase::Running);
        self.wake_loader.notify_one();
    }

    /// Signals the loader task to stop; the returned future from
    /// [`crate::create_blocks_queue`] resolves shortly after.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// True once the loader has caught up to `max_height` (spec §4.4's
    /// `maxBlockHeight`) and there is nothing left queued or reserved
    /// to dispatch — the signal a consumer uses to shut down cleanly
    /// instead of polling forever.
    pub async fn is_exhausted(&self, max_height: Option<u64>) -> bool {
        self.state.lock().await.is_exhausted(max_height)
    }
}

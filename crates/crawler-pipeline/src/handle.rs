use std::sync::Arc;

use tokio::sync::watch;

/// Handle to a running pipeline task, grounded on
/// `crawler_blocks_queue::BlocksQueueHandle`'s stop-signal shape.
#[derive(Debug, Clone)]
pub struct PipelineHandle {
    pub(crate) stop_tx: Arc<watch::Sender<bool>>,
}

impl PipelineHandle {
    /// Signals the pipeline task to stop after its current batch. The
    /// future returned by `crate::create_pipeline` resolves shortly
    /// after.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }
}

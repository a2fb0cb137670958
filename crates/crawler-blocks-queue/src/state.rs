use std::collections::VecDeque;

use crawler_primitives::FullBlock;

fn byte_size(block: &FullBlock) -> u64 {
    bitcoin::consensus::encode::serialize(&block.block).len() as u64
}

/// The lifecycle states from spec §4.4. `Draining`/`Running` are both
/// represented by the queue simply having work or not; the explicit
/// states the handle reports are the ones callers actually branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueuePhase {
    Idle,
    Starting,
    Running,
    Draining,
    Stopped,
}

/// Shared mutable state behind the loader and the iterator side of the
/// handle. `pending` holds fetched-but-undispatched blocks; `reserved`
/// holds blocks handed to `next_batch` awaiting `confirm_processed_batch`.
pub(crate) struct QueueState {
    pub(crate) loaded_up_to: i64,
    pub(crate) pending: VecDeque<FullBlock>,
    pub(crate) reserved: VecDeque<FullBlock>,
    pub(crate) total_bytes: u64,
    pub(crate) max_bytes: u64,
}

impl QueueState {
    pub(crate) fn new(initial_height: i64, max_bytes: u64) -> Self {
        Self {
            loaded_up_to: initial_height - 1,
            pending: VecDeque::new(),
            reserved: VecDeque::new(),
            total_bytes: 0,
            max_bytes,
        }
    }

    pub(crate) fn has_capacity(&self) -> bool {
        self.total_bytes < self.max_bytes
    }

    /// True once the loader has caught up to `max_height` and nothing
    /// is left to dispatch — the "iterator drains what remains queued"
    /// end-of-range condition (spec §4.4's `maxBlockHeight`). `None`
    /// means unbounded, so never exhausted.
    pub(crate) fn is_exhausted(&self, max_height: Option<u64>) -> bool {
        match max_height {
            Some(max_height) => self.loaded_up_to >= max_height as i64 && self.pending.is_empty() && self.reserved.is_empty(),
            None => false,
        }
    }

    pub(crate) fn push_loaded(&mut self, blocks: Vec<FullBlock>) {
        for block in blocks {
            self.loaded_up_to = self.loaded_up_to.max(block.height as i64);
            self.total_bytes += byte_size(&block);
            self.pending.push_back(block);
        }
    }

    /// Moves up to `batch_size` contiguous blocks from `pending` into
    /// `reserved` and returns them. Empty if nothing is queued.
    pub(crate) fn take_batch(&mut self, batch_size: usize) -> Vec<FullBlock> {
        let mut out = Vec::with_capacity(batch_size.min(self.pending.len()));
        while out.len() < batch_size {
            match self.pending.pop_front() {
                Some(block) => {
                    self.reserved.push_back(block.clone());
                    out.push(block);
                }
                None => break,
            }
        }
        out
    }

    /// Drops confirmed blocks from `reserved` and frees their bytes.
    pub(crate) fn confirm(&mut self, hashes: &[bitcoin::BlockHash]) {
        self.reserved.retain(|block| {
            let confirmed = hashes.contains(&block.block_hash());
            if confirmed {
                self.total_bytes = self.total_bytes.saturating_sub(byte_size(block));
            }
            !confirmed
        });
    }

    /// Returns blocks matching `hashes` from `reserved` to the front
    /// of `pending`, preserving their relative order, so a failed
    /// batch is retried instead of stuck holding reserved capacity
    /// forever (spec §7: a save conflict "aborts the batch; iterator
    /// will re-dispatch"). Bytes stay counted against `total_bytes`
    /// throughout, since both `pending` and `reserved` count toward it.
    pub(crate) fn release(&mut self, hashes: &[bitcoin::BlockHash]) {
        let mut released = VecDeque::new();
        self.reserved.retain(|block| {
            if hashes.contains(&block.block_hash()) {
                released.push_back(block.clone());
                false
            } else {
                true
            }
        });
        for block in released.into_iter().rev() {
            self.pending.push_front(block);
        }
    }

    /// Discards queued and reserved blocks past `new_tip` and rewinds
    /// `loaded_up_to`, for the reorg `Drain -> Reset(newTip)` transition.
    pub(crate) fn reset_to(&mut self, new_tip: i64) {
        self.pending.retain(|b| (b.height as i64) <= new_tip);
        self.reserved.retain(|b| (b.height as i64) <= new_tip);
        self.total_bytes = self.pending.iter().chain(self.reserved.iter()).map(byte_size).sum();
        self.loaded_up_to = self.loaded_up_to.min(new_tip);
    }
}

#[cfg(test)]
mod tests {
    use bitcoin::{blockdata::constants::genesis_block, Network};

    use super::*;

    fn block(height: u64) -> FullBlock {
        FullBlock::new(height, genesis_block(Network::Regtest))
    }

    #[test]
    fn take_batch_moves_blocks_into_reserved() {
        let mut state = QueueState::new(0, 1_000_000);
        state.push_loaded(vec![block(0), block(1), block(2)]);
        let batch = state.take_batch(2);
        assert_eq!(batch.len(), 2);
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.reserved.len(), 2);
    }

    #[test]
    fn confirm_frees_bytes_and_drops_reserved_entries() {
        let mut state = QueueState::new(0, 1_000_000);
        state.push_loaded(vec![block(0)]);
        let batch = state.take_batch(1);
        let hash = batch[0].block_hash();
        assert!(state.total_bytes > 0);
        state.confirm(&[hash]);
        assert!(state.reserved.is_empty());
        assert_eq!(state.total_bytes, 0);
    }

    #[test]
    fn release_returns_reserved_blocks_to_the_front_of_pending() {
        let mut state = QueueState::new(0, 1_000_000);
        state.push_loaded(vec![block(0), block(1), block(2)]);
        let batch = state.take_batch(2);
        assert_eq!(state.pending.len(), 1);
        assert_eq!(state.reserved.len(), 2);
        let total_before = state.total_bytes;

        let hashes: Vec<bitcoin::BlockHash> = batch.iter().map(|b| b.block_hash()).collect();
        state.release(&hashes);

        assert!(state.reserved.is_empty());
        assert_eq!(state.pending.len(), 3);
        assert_eq!(state.pending.iter().map(|b| b.height).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(state.total_bytes, total_before);
    }

    #[test]
    fn reset_to_discards_blocks_past_the_new_tip() {
        let mut state = QueueState::new(0, 1_000_000);
        state.push_loaded(vec![block(0), block(1), block(2)]);
        state.take_batch(1);
        state.reset_to(0);
        assert!(state.pending.is_empty());
        assert_eq!(state.reserved.len(), 1);
        assert_eq!(state.loaded_up_to, 0);
    }
}

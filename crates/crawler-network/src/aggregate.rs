use std::collections::VecDeque;

use bitcoin::BlockHash;
use crawler_aggregate::{Aggregate, AggregateError, Event, NO_BLOCK_HEIGHT};
use crawler_primitives::{LightBlock, RequestId};

use crate::{
    error::NetworkAggregateError,
    events::{
        NetworkBlocksAdded, NetworkCleared, NetworkInitialized, NetworkReorganized,
        EVENT_NETWORK_BLOCKS_ADDED, EVENT_NETWORK_CLEARED, EVENT_NETWORK_INITIALIZED,
        EVENT_NETWORK_REORGANIZED,
    },
    service::ForkLookup,
};

pub const AGGREGATE_ID: &str = "network";

/// What `init` decided to do (spec §4.2's `init` rules). A gap between
/// the configured start and the persisted tip needs an operator's
/// explicit go-ahead before the aggregate will emit `NetworkCleared`
/// and rewind — see spec §7's "operator-required" error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Initialized { start_height: i64 },
    GapRequiresConfirmation { configured_start: i64, last_block_height: i64 },
}

/// The network aggregate (spec §4.2): a bounded ring of [`LightBlock`]
/// tracking the chain tip, grounded on `strata-btcio`'s `ReaderState`
/// (`VecDeque` ring with height/hash bookkeeping and a backward-walk
/// fork search).
#[derive(Debug)]
pub struct NetworkAggregate {
    version: u64,
    last_block_height: i64,
    uncommitted: Vec<Event>,
    chain: VecDeque<LightBlock>,
    max_size: usize,
}

impl NetworkAggregate {
    pub fn new(max_size: usize) -> Self {
        Self {
            version: 0,
            last_block_height: NO_BLOCK_HEIGHT,
            uncommitted: Vec::new(),
            chain: VecDeque::new(),
            max_size,
        }
    }

    pub fn chain(&self) -> impl Iterator<Item = &LightBlock> {
        self.chain.iter()
    }

    pub fn tip(&self) -> Option<&LightBlock> {
        self.chain.back()
    }

    /// Spec §4.2's `init`. `current_network_height` is the node's
    /// current tip, used only when this is the very first run (no
    /// prior events for this aggregate). `operator_confirmed_gap`
    /// stands in for the interactive confirmation prompt: pass `false`
    /// on the first attempt; if the result is
    /// [`InitOutcome::GapRequiresConfirmation`], ask the operator and
    /// retry with `true` to proceed.
    pub fn init(
        &mut self,
        request_id: RequestId,
        configured_start_height: Option<i64>,
        current_network_height: u64,
        operator_confirmed_gap: bool,
    ) -> Result<InitOutcome, NetworkAggregateError> {
        let store_empty = self.version == 0;

        let target = if store_empty {
            match configured_start_height {
                None => current_network_height as i64 - 1,
                Some(configured) => configured - 1,
            }
        } else {
            match configured_start_height {
                None => self.last_block_height,
                Some(configured) if configured <= self.last_block_height => self.last_block_height,
                Some(configured) if configured > self.last_block_height + 1 => {
                    if !operator_confirmed_gap {
                        return Ok(InitOutcome::GapRequiresConfirmation {
                            configured_start: configured,
                            last_block_height: self.last_block_height,
                        });
                    }
                    self.apply(
                        request_id,
                        EVENT_NETWORK_CLEARED,
                        NO_BLOCK_HEIGHT,
                        serde_json::to_value(NetworkCleared::default())?,
                    )?;
                    configured - 1
                }
                Some(configured) => configured - 1,
            }
        };

        self.apply(
            request_id,
            EVENT_NETWORK_INITIALIZED,
            target,
            serde_json::to_value(NetworkInitialized { start_height: target })?,
        )?;
        Ok(InitOutcome::Initialized { start_height: target })
    }

    /// Spec §4.2's `addBlocks`. `blocks` must already be in strict
    /// ascending height order (the blocks queue's contract); this only
    /// checks that the batch extends the current tip.
    pub fn add_blocks(&mut self, request_id: RequestId, blocks: &[LightBlock]) -> Result<(), NetworkAggregateError> {
        let Some(first) = blocks.first() else { return Ok(()) };

        let mut expected_height = (self.last_block_height + 1) as u64;
        let mut expected_prev_hash: Option<BlockHash> = self.chain.back().map(|b| b.hash);

        if first.height != expected_height {
            return Err(NetworkAggregateError::BlockchainValidation {
                expected_height,
                actual_height: first.height,
            });
        }

        for block in blocks {
            if block.height != expected_height {
                return Err(NetworkAggregateError::BlockchainValidation {
                    expected_height,
                    actual_height: block.height,
                });
            }
            if let Some(prev) = expected_prev_hash {
                if block.previousblockhash != prev {
                    return Err(NetworkAggregateError::BlockchainValidation {
                        expected_height,
                        actual_height: block.height,
                    });
                }
            }
            expected_height += 1;
            expected_prev_hash = Some(block.hash);
        }

        let highest = blocks.last().expect("checked non-empty above").height;
        self.apply(
            request_id,
            EVENT_NETWORK_BLOCKS_ADDED,
            highest as i64,
            serde_json::to_value(NetworkBlocksAdded { blocks: blocks.to_vec() })?,
        )?;
        Ok(())
    }

    /// Spec §4.2's `reorganisation`: walk the retained ring back from
    /// the tip, asking `service` for the canonical hash at each height
    /// until one matches. Returns the fork height `F` on success.
    pub async fn reorganisation<S: ForkLookup + ?Sized>(
        &mut self,
        request_id: RequestId,
        service: &S,
    ) -> Result<u64, NetworkAggregateError> {
        let mut fork_height = None;
        for block in self.chain.iter().rev() {
            let canonical = service
                .block_hash_at_height(block.height)
                .await
                .map_err(NetworkAggregateError::ForkLookup)?;
            if canonical == block.hash {
                fork_height = Some(block.height);
                break;
            }
        }

        let fork_height = fork_height.ok_or(NetworkAggregateError::ReorgBeyondRetainedWindow { window: self.max_size })?;

        let truncated: Vec<LightBlock> = self.chain.iter().filter(|b| b.height > fork_height).cloned().collect();
        self.apply(
            request_id,
            EVENT_NETWORK_REORGANIZED,
            fork_height as i64,
            serde_json::to_value(NetworkReorganized { reorg_height: fork_height, truncated })?,
        )?;
        Ok(fork_height)
    }

    /// Spec §4.2's `clearChain`, used before a full store rollback.
    pub fn clear_chain(&mut self, request_id: RequestId) -> Result<(), NetworkAggregateError> {
        self.apply(
            request_id,
            EVENT_NETWORK_CLEARED,
            NO_BLOCK_HEIGHT,
            serde_json::to_value(NetworkCleared::default())?,
        )?;
        Ok(())
    }

    fn on_blocks_added(&mut self, payload: &serde_json::Value) -> Result<(), AggregateError> {
        let added: NetworkBlocksAdded =
            serde_json::from_value(payload.clone()).map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
        for block in added.blocks {
            self.chain.push_back(block);
            if self.chain.len() > self.max_size {
                self.chain.pop_front();
            }
        }
        Ok(())
    }

    fn on_reorganized(&mut self, payload: &serde_json::Value) -> Result<(), AggregateError> {
        let reorg: NetworkReorganized =
            serde_json::from_value(payload.clone()).map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
        self.chain.retain(|b| b.height <= reorg.reorg_height);
        Ok(())
    }
}

impl Aggregate for NetworkAggregate {
    fn aggregate_id(&self) -> &str {
        AGGREGATE_ID
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn last_block_height(&self) -> i64 {
        self.last_block_height
    }

    fn uncommitted_events(&self) -> &[Event] {
        &self.uncommitted
    }

    fn handle(&mut self, event: &Event) -> Result<(), AggregateError> {
        match event.event_type.as_str() {
            EVENT_NETWORK_INITIALIZED => Ok(()),
            EVENT_NETWORK_BLOCKS_ADDED => self.on_blocks_added(&event.payload),
            EVENT_NETWORK_REORGANIZED => self.on_reorganized(&event.payload),
            EVENT_NETWORK_CLEARED => {
                self.chain.clear();
                Ok(())
            }
            other => Err(AggregateError::UnknownEventType(other.to_string())),
        }
    }

    fn serialize_user_state(&self) -> Result<Vec<u8>, AggregateError> {
        let blocks: Vec<&LightBlock> = self.chain.iter().collect();
        bincode::serialize(&blocks).map_err(|e| AggregateError::CorruptSnapshot(e.to_string()))
    }

    fn restore_user_state(&mut self, bytes: &[u8]) -> Result<(), AggregateError> {
        let blocks: Vec<LightBlock> =
            bincode::deserialize(bytes).map_err(|e| AggregateError::CorruptSnapshot(e.to_string()))?;
        self.chain = blocks.into_iter().collect();
        Ok(())
    }

    fn reset(&mut self) {
        self.version = 0;
        self.last_block_height = NO_BLOCK_HEIGHT;
        self.uncommitted.clear();
        self.chain.clear();
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn set_last_block_height(&mut self, height: i64) {
        self.last_block_height = height;
    }

    fn push_uncommitted(&mut self, event: Event) {
        self.uncommitted.push(event);
    }

    fn take_uncommitted(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.uncommitted)
    }
}

impl From<serde_json::Error> for NetworkAggregateError {
    fn from(e: serde_json::Error) -> Self {
        NetworkAggregateError::Aggregate(AggregateError::HandlerFailed(e.to_string()))
    }
}

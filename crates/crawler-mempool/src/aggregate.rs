use std::{collections::HashSet, num::NonZeroUsize};

use bitcoin::Txid;
use crawler_aggregate::{Aggregate, AggregateError, Event, NO_BLOCK_HEIGHT};
use crawler_node_provider::NodeProvider;
use crawler_primitives::RequestId;
use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    entry::MempoolEntry,
    error::MempoolAggregateError,
    events::{
        MempoolBlockConfirmed, MempoolIncrementalSync, MempoolInitialized, MempoolReorganized, MempoolTxMeta,
        EVENT_MEMPOOL_BLOCK_CONFIRMED, EVENT_MEMPOOL_INCREMENTAL_SYNC, EVENT_MEMPOOL_INITIALIZED,
        EVENT_MEMPOOL_REORGANIZED,
    },
    options::MempoolOptions,
};

/// Lazily-recomputed fee-rate stats (spec §4.6: "no fee-rate rebuild
/// on every insert; maintain ... lazy statistics recomputed on
/// query").
#[derive(Debug, Clone, Copy, Default)]
pub struct MempoolStats {
    pub entry_count: usize,
    pub total_bytes: u64,
    pub min_fee_rate: f64,
    pub max_fee_rate: f64,
    pub avg_fee_rate: f64,
}

/// Snapshot-serializable projection of one entry. `providers` is
/// runtime-only and not carried across a snapshot restore; a resumed
/// mempool re-learns providers on the next sync.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    txid: Txid,
    vsize: u64,
    fee_sat: u64,
    modified_fee_sat: Option<u64>,
    time: i64,
}

/// The optional Mempool aggregate (spec §4.6): a bounded, LRU-evicted
/// cache of unconfirmed transactions, refreshed by an independent sync
/// loop rather than by block ingestion.
#[derive(Debug)]
pub struct MempoolAggregate {
    version: u64,
    last_block_height: i64,
    uncommitted: Vec<Event>,
    entries: LruCache<Txid, MempoolEntry>,
    total_bytes: u64,
    options: MempoolOptions,
    stats_dirty: bool,
    cached_stats: MempoolStats,
}

impl MempoolAggregate {
    pub fn new(options: MempoolOptions) -> Self {
        let capacity = NonZeroUsize::new(options.capacity.max(1)).expect("capacity clamped to at least 1");
        Self {
            version: 0,
            last_block_height: NO_BLOCK_HEIGHT,
            uncommitted: Vec::new(),
            entries: LruCache::new(capacity),
            total_bytes: 0,
            options,
            stats_dirty: true,
            cached_stats: MempoolStats::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, txid: &Txid) -> bool {
        self.entries.contains(txid)
    }

    pub fn tracked_txids(&self) -> impl Iterator<Item = &Txid> {
        self.entries.iter().map(|(txid, _)| txid)
    }

    /// Recomputes fee-rate stats only if entries changed since the
    /// last call.
    pub fn stats(&mut self) -> MempoolStats {
        if self.stats_dirty {
            let rates: Vec<f64> = self.entries.iter().map(|(_, e)| e.fee_rate_sat_per_vb()).collect();
            self.cached_stats = if rates.is_empty() {
                MempoolStats { entry_count: 0, total_bytes: self.total_bytes, ..Default::default() }
            } else {
                let min = rates.iter().cloned().fold(f64::INFINITY, f64::min);
                let max = rates.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let sum: f64 = rates.iter().sum();
                MempoolStats {
                    entry_count: rates.len(),
                    total_bytes: self.total_bytes,
                    min_fee_rate: min,
                    max_fee_rate: max,
                    avg_fee_rate: sum / rates.len() as f64,
                }
            };
            self.stats_dirty = false;
        }
        self.cached_stats
    }

    /// Snapshots the node's current mempool (spec §4.6's `init`).
    pub fn init(&mut self, request_id: RequestId, entries: Vec<MempoolTxMeta>) -> Result<(), MempoolAggregateError> {
        self.apply(
            request_id,
            EVENT_MEMPOOL_INITIALIZED,
            NO_BLOCK_HEIGHT,
            serde_json::to_value(MempoolInitialized { entries })?,
        )?;
        Ok(())
    }

    /// Diffs the node's current mempool against the cached txid set and
    /// applies an `IncrementalSync` event (spec §4.6's `processSync`).
    pub async fn process_sync(
        &mut self,
        request_id: RequestId,
        node: &dyn NodeProvider,
    ) -> Result<(), MempoolAggregateError> {
        let live: HashSet<Txid> = node.list_mempool_txids().await?.into_iter().collect();
        let cached: HashSet<Txid> = self.entries.iter().map(|(txid, _)| *txid).collect();

        let removed: Vec<Txid> = cached.difference(&live).copied().collect();
        let new_txids: Vec<Txid> = live.difference(&cached).copied().collect();

        let added = if new_txids.is_empty() {
            Vec::new()
        } else {
            node.get_mempool_transactions_verbose(&new_txids)
                .await?
                .into_iter()
                .map(|tx| MempoolTxMeta {
                    txid: tx.txid,
                    vsize: tx.vsize,
                    fee_sat: tx.fee_sat,
                    modified_fee_sat: None,
                    time: tx.time,
                    provider: "node".to_string(),
                })
                .collect()
        };

        if added.is_empty() && removed.is_empty() {
            return Ok(());
        }
        debug!(added = added.len(), removed = removed.len(), "mempool incremental sync");

        self.apply(
            request_id,
            EVENT_MEMPOOL_INCREMENTAL_SYNC,
            NO_BLOCK_HEIGHT,
            serde_json::to_value(MempoolIncrementalSync { added, removed })?,
        )?;
        Ok(())
    }

    /// Drops txids now confirmed in a processed block batch (spec
    /// §4.6's `processBlocksBatch`).
    pub fn process_blocks_batch(
        &mut self,
        request_id: RequestId,
        block_height: i64,
        confirmed_in_batch: &[Txid],
    ) -> Result<(), MempoolAggregateError> {
        let confirmed: Vec<Txid> = confirmed_in_batch.iter().filter(|t| self.entries.contains(t)).copied().collect();
        if confirmed.is_empty() {
            return Ok(());
        }
        self.apply(
            request_id,
            EVENT_MEMPOOL_BLOCK_CONFIRMED,
            block_height,
            serde_json::to_value(MempoolBlockConfirmed { confirmed })?,
        )?;
        Ok(())
    }

    /// Re-fetches the node's current mempool entry for each txid
    /// orphaned by a reorg and reinserts it (spec §4.6's
    /// `processReorganisation`).
    pub async fn process_reorganisation(
        &mut self,
        request_id: RequestId,
        node: &dyn NodeProvider,
        orphaned_txids: &[Txid],
    ) -> Result<(), MempoolAggregateError> {
        if orphaned_txids.is_empty() {
            return Ok(());
        }
        let reinserted: Vec<MempoolTxMeta> = node
            .get_mempool_transactions_verbose(orphaned_txids)
            .await?
            .into_iter()
            .map(|tx| MempoolTxMeta {
                txid: tx.txid,
                vsize: tx.vsize,
                fee_sat: tx.fee_sat,
                modified_fee_sat: None,
                time: tx.time,
                provider: "node".to_string(),
            })
            .collect();

        if reinserted.is_empty() {
            return Ok(());
        }

        self.apply(
            request_id,
            EVENT_MEMPOOL_REORGANIZED,
            NO_BLOCK_HEIGHT,
            serde_json::to_value(MempoolReorganized { reinserted })?,
        )?;
        Ok(())
    }

    fn insert_filtered(&mut self, meta: &MempoolTxMeta) {
        let entry = MempoolEntry::from_meta(meta);
        if entry.fee_rate_sat_per_vb() < self.options.min_fee_rate_sat_per_vb {
            return;
        }
        if let Some(old) = self.entries.put(entry.txid, entry) {
            self.total_bytes = self.total_bytes.saturating_sub(old.approx_bytes());
        }
        let added_bytes = self.entries.peek(&meta.txid).map(|e| e.approx_bytes()).unwrap_or(0);
        self.total_bytes += added_bytes;

        while self.total_bytes > self.options.max_bytes {
            match self.entries.pop_lru() {
                Some((_, evicted)) => self.total_bytes = self.total_bytes.saturating_sub(evicted.approx_bytes()),
                None => break,
            }
        }
        self.stats_dirty = true;
    }

    fn remove(&mut self, txid: &Txid) {
        if let Some(entry) = self.entries.pop(txid) {
            self.total_bytes = self.total_bytes.saturating_sub(entry.approx_bytes());
            self.stats_dirty = true;
        }
    }
}

pub const AGGREGATE_ID: &str = "mempool";

impl Aggregate for MempoolAggregate {
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
            EVENT_MEMPOOL_INITIALIZED => {
                let payload: MempoolInitialized =
                    serde_json::from_value(event.payload.clone()).map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
                for meta in &payload.entries {
                    self.insert_filtered(meta);
                }
                Ok(())
            }
            EVENT_MEMPOOL_INCREMENTAL_SYNC => {
                let payload: MempoolIncrementalSync =
                    serde_json::from_value(event.payload.clone()).map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
                for txid in &payload.removed {
                    self.remove(txid);
                }
                for meta in &payload.added {
                    self.insert_filtered(meta);
                }
                Ok(())
            }
            EVENT_MEMPOOL_BLOCK_CONFIRMED => {
                let payload: MempoolBlockConfirmed =
                    serde_json::from_value(event.payload.clone()).map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
                for txid in &payload.confirmed {
                    self.remove(txid);
                }
                Ok(())
            }
            EVENT_MEMPOOL_REORGANIZED => {
                let payload: MempoolReorganized =
                    serde_json::from_value(event.payload.clone()).map_err(|e| AggregateError::HandlerFailed(e.to_string()))?;
                for meta in &payload.reinserted {
                    self.insert_filtered(meta);
                }
                Ok(())
            }
            other => Err(AggregateError::UnknownEventType(other.to_string())),
        }
    }

    fn serialize_user_state(&self) -> Result<Vec<u8>, AggregateError> {
        let stored: Vec<StoredEntry> = self
            .entries
            .iter()
            .map(|(_, e)| StoredEntry {
                txid: e.txid,
                vsize: e.vsize,
                fee_sat: e.fee_sat,
                modified_fee_sat: e.modified_fee_sat,
                time: e.time,
            })
            .collect();
        bincode::serialize(&stored).map_err(|e| AggregateError::CorruptSnapshot(e.to_string()))
    }

    fn restore_user_state(&mut self, bytes: &[u8]) -> Result<(), AggregateError> {
        let stored: Vec<StoredEntry> = bincode::deserialize(bytes).map_err(|e| AggregateError::CorruptSnapshot(e.to_string()))?;
        for s in stored {
            self.insert_filtered(&MempoolTxMeta {
                txid: s.txid,
                vsize: s.vsize,
                fee_sat: s.fee_sat,
                modified_fee_sat: s.modified_fee_sat,
                time: s.time,
                provider: "snapshot".to_string(),
            });
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.version = 0;
        self.last_block_height = NO_BLOCK_HEIGHT;
        self.uncommitted.clear();
        self.entries.clear();
        self.total_bytes = 0;
        self.stats_dirty = true;
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

use std::{future::Future, sync::atomic::{AtomicUsize, Ordering}, time::Duration};

use async_trait::async_trait;
use bitcoin::{BlockHash, Txid};
use bitcoind_async_client::{traits::Reader, Client};
use crawler_primitives::FullBlock;
use tracing::warn;

use crate::{
    error::NodeProviderError,
    rate_limit::{chunk_heights, RateLimitConfig, RateLimiter},
    traits::NodeProvider,
    types::{BlockStats, MempoolTransaction},
};

/// Configuration for [`BitcoindProvider`] (spec §6.5's `PROVIDER_*`
/// options).
#[derive(Debug, Clone)]
pub struct BitcoindProviderConfig {
    pub rpc_urls: Vec<String>,
    pub rpc_user: String,
    pub rpc_password: String,
    pub retry_count: u8,
    pub retry_interval: u16,
    pub rate_limit: RateLimitConfig,
}

/// The default `NodeProvider` (spec §6.2), wrapping one
/// [`bitcoind_async_client::Client`] per configured URL. Grounded on
/// `bin/strata/src/context.rs`'s `create_bitcoin_rpc_client` for how
/// the teacher constructs a `Client`, and on
/// `other_examples/…btcio-src-reader-query.rs`'s `do_reader_task`
/// recoverable-error handling for the failover policy: a connect or
/// timeout error advances to the next configured URL.
#[derive(Debug)]
pub struct BitcoindProvider {
    clients: Vec<Client>,
    current: AtomicUsize,
    limiter: RateLimiter,
    max_batch_size: usize,
    response_timeout: Duration,
}

impl BitcoindProvider {
    pub fn new(config: BitcoindProviderConfig) -> Result<Self, NodeProviderError> {
        let clients = config
            .rpc_urls
            .iter()
            .map(|url| {
                Client::new(
                    url.clone(),
                    config.rpc_user.clone(),
                    config.rpc_password.clone(),
                    config.retry_count,
                    config.retry_interval,
                )
                .map_err(|e| NodeProviderError::Rpc(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if clients.is_empty() {
            return Err(NodeProviderError::Rpc("no RPC URLs configured".into()));
        }

        Ok(Self {
            clients,
            current: AtomicUsize::new(0),
            max_batch_size: config.rate_limit.max_batch_size,
            response_timeout: config.rate_limit.response_timeout,
            limiter: RateLimiter::new(&config.rate_limit),
        })
    }

    /// Runs `call` against the current client; on failure, advances
    /// through the remaining configured clients before giving up.
    async fn with_failover<T, F, Fut>(&self, call: F) -> Result<T, NodeProviderError>
    where
        F: Fn(&Client) -> Fut,
        Fut: Future<Output = bitcoind_async_client::ClientResult<T>>,
    {
        let _permit = self.limiter.acquire().await;
        let start = self.current.load(Ordering::Relaxed);
        let mut last_err = None;

        for offset in 0..self.clients.len() {
            let idx = (start + offset) % self.clients.len();
            let client = &self.clients[idx];
            match tokio::time::timeout(self.response_timeout, call(client)).await {
                Ok(Ok(value)) => {
                    self.current.store(idx, Ordering::Relaxed);
                    return Ok(value);
                }
                Ok(Err(e)) => {
                    warn!(url_index = idx, err = %e, "rpc call failed, trying next endpoint");
                    last_err = Some(e.to_string());
                }
                Err(_) => {
                    warn!(url_index = idx, "rpc call timed out, trying next endpoint");
                    last_err = Some("timeout".to_string());
                }
            }
        }

        Err(NodeProviderError::AllEndpointsFailed {
            tried: self.clients.len(),
            last: last_err.unwrap_or_else(|| "no endpoints configured".into()),
        })
    }
}

#[async_trait]
impl NodeProvider for BitcoindProvider {
    async fn get_current_block_height_from_network(&self) -> Result<u64, NodeProviderError> {
        self.with_failover(|c| c.get_block_count()).await
    }

    async fn get_current_block_height_from_mempool(&self) -> Result<u64, NodeProviderError> {
        self.with_failover(|c| c.get_block_count()).await
    }

    async fn get_many_blocks_stats_by_heights(&self, heights: &[u64]) -> Result<Vec<BlockStats>, NodeProviderError> {
        let mut out = Vec::with_capacity(heights.len());
        for chunk in chunk_heights(heights, self.max_batch_size) {
            for &height in chunk {
                let block = self.with_failover(move |c| c.get_block_at(height)).await?;
                let total_size = bitcoin::consensus::encode::serialize(&block).len() as u64;
                out.push(BlockStats { height, blockhash: block.block_hash(), total_size });
            }
        }
        Ok(out)
    }

    async fn get_many_blocks_by_heights(&self, heights: &[u64]) -> Result<Vec<FullBlock>, NodeProviderError> {
        let mut out = Vec::with_capacity(heights.len());
        for chunk in chunk_heights(heights, self.max_batch_size) {
            for &height in chunk {
                let block = self.with_failover(move |c| c.get_block_at(height)).await?;
                out.push(FullBlock::new(height, block));
            }
        }
        Ok(out)
    }

    async fn get_many_blocks_by_hashes(&self, hashes: &[BlockHash]) -> Result<Vec<FullBlock>, NodeProviderError> {
        let mut out = Vec::with_capacity(hashes.len());
        for chunk in hashes.chunks(self.max_batch_size.max(1)) {
            for &hash in chunk {
                let block = self.with_failover(move |c| c.get_block(&hash)).await?;
                let height = self.with_failover(move |c| c.get_block_height(&hash)).await?;
                out.push(FullBlock::new(height, block));
            }
        }
        Ok(out)
    }

    async fn get_block_hash_at_height(&self, height: u64) -> Result<BlockHash, NodeProviderError> {
        self.with_failover(move |c| c.get_block_hash(height)).await
    }

    async fn list_mempool_txids(&self) -> Result<Vec<Txid>, NodeProviderError> {
        Ok(self.with_failover(|c| c.get_raw_mempool()).await?.0)
    }

    async fn get_mempool_transactions_verbose(
        &self,
        txids: &[Txid],
    ) -> Result<Vec<MempoolTransaction>, NodeProviderError> {
        let wanted: std::collections::HashSet<&Txid> = txids.iter().collect();
        let mempool = self.with_failover(|c| c.get_raw_mempool_verbose()).await?.0;
        Ok(mempool
            .into_iter()
            .filter(|(txid, _)| wanted.contains(txid))
            .map(|(txid, entry)| MempoolTransaction {
                txid,
                vsize: entry.vsize,
                fee_sat: entry.fees.base.to_sat(),
                time: entry.time as i64,
            })
            .collect())
    }
}


//! Crawler binary entrypoint: wires the node provider, event store,
//! blocks queue and pipeline together and runs them until `ctrl_c`.

mod args;
mod publish;

use std::{io::Write as _, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use crawler_aggregate::AggregateOptions;
use crawler_blocks_queue::{create_blocks_queue, BlocksQueueConfig, PullNetwork, Sequential};
use crawler_event_store::{EventStore, SaveItem, SledEventStore};
use crawler_mempool::MempoolOptions;
use crawler_network::{InitOutcome, NetworkAggregate};
use crawler_node_provider::{BitcoindProvider, BitcoindProviderConfig, NodeProvider, RateLimitConfig};
use crawler_pipeline::{create_pipeline, PipelineConfig, PipelineState};
use crawler_primitives::RequestId;
use crawler_transport::ChannelPublisher;
use tracing::info;

use crate::args::Args;

fn main() -> Result<()> {
    let args = Args::parse();
    let config = crawler_config::load(&args.config, &args.all_overrides())
        .with_context(|| format!("failed to load config from {}", args.config.display()))?;

    tracing_subscriber::fmt::init();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("crawler-rt")
        .build()
        .context("failed to build the tokio runtime")?;

    rt.block_on(run(config))
}

async fn run(config: crawler_config::Config) -> Result<()> {
    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data_dir {}", config.data_dir))?;
    let event_store: Arc<dyn EventStore> =
        Arc::new(SledEventStore::open(&config.data_dir).context("failed to open the event store")?);

    let rate_limit = RateLimitConfig {
        max_concurrent_requests: config.provider.rate_limit_max_concurrent_requests,
        max_batch_size: config.provider.rate_limit_max_batch_size,
        request_delay: Duration::from_millis(config.provider.rate_limit_request_delay_ms),
        ..RateLimitConfig::default()
    };

    let network_node: Arc<dyn NodeProvider> = Arc::new(
        BitcoindProvider::new(BitcoindProviderConfig {
            rpc_urls: config.provider.network_rpc_urls.clone(),
            rpc_user: config.provider.rpc_user.clone(),
            rpc_password: config.provider.rpc_password.clone(),
            retry_count: config.provider.retry_count,
            retry_interval: config.provider.retry_interval,
            rate_limit: rate_limit.clone(),
        })
        .context("failed to build the network RPC provider")?,
    );

    let mempool_node: Option<Arc<dyn NodeProvider>> = if config.provider.mempool_rpc_urls.is_empty() {
        None
    } else {
        Some(Arc::new(
            BitcoindProvider::new(BitcoindProviderConfig {
                rpc_urls: config.provider.mempool_rpc_urls.clone(),
                rpc_user: config.provider.rpc_user.clone(),
                rpc_password: config.provider.rpc_password.clone(),
                retry_count: config.provider.retry_count,
                retry_interval: config.provider.retry_interval,
                rate_limit,
            })
            .context("failed to build the mempool RPC provider")?,
        ))
    };

    let network_options =
        AggregateOptions { snapshot_interval: config.event_store.snapshot_interval, ..AggregateOptions::default() };

    let mut network = NetworkAggregate::new(config.network_ring_size);
    event_store.get_one(&mut network, &network_options).await.context("failed to load the network aggregate")?;

    let current_height = network_node
        .get_current_block_height_from_network()
        .await
        .context("failed to query the node's current height")?;

    let outcome = network
        .init(RequestId::new(), config.start_block_height.map(|h| h as i64), current_height, false)
        .context("network aggregate init failed")?;

    let rollback_ids = [crawler_network::AGGREGATE_ID.to_string(), crawler_mempool::AGGREGATE_ID.to_string()];

    let start_height = match outcome {
        InitOutcome::Initialized { start_height } => {
            let mut items = [SaveItem::new(&mut network, &network_options)];
            event_store.save(&mut items).await.context("failed to persist network init")?;
            start_height
        }
        InitOutcome::GapRequiresConfirmation { configured_start, last_block_height } => {
            if !confirm_gap(configured_start, last_block_height)? {
                bail!("initialization aborted: operator declined to confirm the gap");
            }
            let confirmed = network
                .init(RequestId::new(), config.start_block_height.map(|h| h as i64), current_height, true)
                .context("network aggregate init failed after gap confirmation")?;
            let InitOutcome::Initialized { start_height } = confirmed else {
                return Err(anyhow!("network aggregate init did not resolve to a start height after confirmation"));
            };
            let mut items = [SaveItem::new(&mut network, &network_options)];
            event_store.rollback(&rollback_ids, -1, &mut items).await.context("failed to roll back stored state")?;
            start_height
        }
    };
    info!(start_height, "network aggregate ready");

    let mempool_options = MempoolOptions { min_fee_rate_sat_per_vb: config.mempool.min_fee_rate, ..MempoolOptions::default() };
    let mempool_aggregate_options = AggregateOptions::default();

    let mut pipeline_state = PipelineState::new(network, network_options, Vec::new());
    if mempool_node.is_some() {
        let mut mempool = crawler_mempool::MempoolAggregate::new(mempool_options);
        event_store
            .get_one(&mut mempool, &mempool_aggregate_options)
            .await
            .context("failed to load the mempool aggregate")?;
        pipeline_state = pipeline_state.with_mempool(mempool, mempool_aggregate_options);
    }

    let strategy: Arc<dyn crawler_blocks_queue::LoaderStrategy> = match config.blocks_queue.loader_strategy_name.as_str() {
        "sequential" => Arc::new(Sequential),
        "pull-network" => Arc::new(PullNetwork),
        other => bail!("unknown blocks_queue loader strategy '{other}'"),
    };

    let mut queue_config = BlocksQueueConfig::new(start_height, strategy);
    queue_config.max_height = config.max_block_height;
    queue_config.max_queue_size_bytes = config.max_queue_size();
    queue_config.loader_request_batch_size = config.queue_loader_request_blocks_batch_size() as usize;
    queue_config.iterator_batch_size = config.queue_iterator_blocks_batch_size() as usize;

    let (queue_handle, loader_task) = create_blocks_queue(queue_config, network_node.clone());

    let mut pipeline_config = PipelineConfig::new(config.network.clone());
    pipeline_config.iterator_batch_size = config.queue_iterator_blocks_batch_size() as usize;
    pipeline_config.max_block_height = config.max_block_height;
    pipeline_config.mempool_sync_interval = mempool_node.as_ref().map(|_| Duration::from_secs(30));

    let (pipeline_handle, pipeline_task) =
        create_pipeline(pipeline_state, network_node, mempool_node, event_store.clone(), queue_handle.clone(), pipeline_config);

    let publisher = Arc::new(ChannelPublisher::new());
    let publish_task = publish::run(event_store, publisher, Duration::from_millis(500));

    let loader_join = tokio::spawn(loader_task);
    let pipeline_join = tokio::spawn(pipeline_task);
    let publish_join = tokio::spawn(publish_task);

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl_c")?;
    info!("shutting down");
    pipeline_handle.stop();
    queue_handle.stop();
    publish_join.abort();

    let _ = pipeline_join.await;
    let _ = loader_join.await;

    Ok(())
}

/// Spec §7's "operator-required" error class: a configured start
/// height that leaves a gap against the store's last block needs an
/// explicit yes before `NetworkCleared`/rollback proceeds.
fn confirm_gap(configured_start: i64, last_block_height: i64) -> Result<bool> {
    print!(
        "configured start height {configured_start} leaves a gap past the stored tip at {last_block_height}; \
         clear all stored state and restart from {configured_start}? [y/N] "
    );
    std::io::stdout().flush().ok();

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).context("failed to read operator confirmation")?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

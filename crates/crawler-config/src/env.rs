use std::env;

/// Maps spec §6.5's enumerated env vars onto the same dotted-path
/// override strings `-o` accepts, so both sources feed
/// [`crate::overrides::apply_override`] uniformly. Env vars are looked
/// up eagerly at construction time so what actually got applied can be
/// logged once, rather than re-reading `std::env` scattered through
/// startup.
const ENV_KEYS: &[(&str, &str)] = &[
    ("DATA_DIR", "data_dir"),
    ("START_BLOCK_HEIGHT", "start_block_height"),
    ("MAX_BLOCK_HEIGHT", "max_block_height"),
    ("NETWORK_TYPE", "network.network"),
    ("NETWORK_MAX_BLOCK_SIZE", "network.max_block_size"),
    ("NETWORK_MAX_BLOCK_WEIGHT", "network.max_block_weight"),
    ("NETWORK_TARGET_BLOCK_TIME", "network.target_block_time_secs"),
    ("BLOCKS_QUEUE_LOADER_STRATEGY_NAME", "blocks_queue.loader_strategy_name"),
    ("BLOCKS_QUEUE_LOADER_PRELOADER_BASE_COUNT", "blocks_queue.loader_preloader_base_count"),
    ("MEMPOOL_MIN_FEE_RATE", "mempool.min_fee_rate"),
    ("EVENTSTORE_SNAPSHOT_INTERVAL", "event_store.snapshot_interval"),
    ("PROVIDER_RATE_LIMIT_MAX_CONCURRENT_REQUESTS", "provider.rate_limit_max_concurrent_requests"),
    ("PROVIDER_RATE_LIMIT_MAX_BATCH_SIZE", "provider.rate_limit_max_batch_size"),
    ("PROVIDER_RATE_LIMIT_REQUEST_DELAY_MS", "provider.rate_limit_request_delay_ms"),
    ("PROVIDER_RPC_USER", "provider.rpc_user"),
    ("PROVIDER_RPC_PASSWORD", "provider.rpc_password"),
];

/// Gathers overrides present in the environment, as `path=value`
/// strings ready for [`crate::overrides::parse_override`]. Comma-lists
/// (`PROVIDER_NETWORK_RPC_URLS`, `PROVIDER_MEMPOOL_RPC_URLS`) aren't
/// single-value overrides and are read separately via
/// [`rpc_url_list`].
pub fn gather_overrides() -> Vec<String> {
    ENV_KEYS
        .iter()
        .filter_map(|(env_key, path)| env::var(env_key).ok().map(|value| format!("{path}={value}")))
        .collect()
}

/// Reads a comma-separated RPC url list from the environment, if set.
pub fn rpc_url_list(env_key: &str) -> Option<Vec<String>> {
    env::var(env_key).ok().map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_url_list_splits_and_trims() {
        // SAFETY: test runs single-threaded within this process; no other
        // test reads this key.
        unsafe {
            env::set_var("CRAWLER_CONFIG_TEST_RPC_URLS", "http://a, http://b");
        }
        let urls = rpc_url_list("CRAWLER_CONFIG_TEST_RPC_URLS").unwrap();
        assert_eq!(urls, vec!["http://a".to_string(), "http://b".to_string()]);
        unsafe {
            env::remove_var("CRAWLER_CONFIG_TEST_RPC_URLS");
        }
    }

    #[test]
    fn rpc_url_list_is_none_when_unset() {
        assert!(rpc_url_list("CRAWLER_CONFIG_TEST_RPC_URLS_UNSET").is_none());
    }
}

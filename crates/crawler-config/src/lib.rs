//! Loads the crawler's TOML config file, layers env-var and CLI
//! overrides on top (spec §6.5), and exposes the derived blocks-queue
//! sizing `crawler-blocks-queue`/`crawler-pipeline` need at startup.

mod config;
mod env;
mod error;
mod overrides;

use std::{fs, path::Path};

pub use config::{BlocksQueueSettings, Config, EventStoreSettings, MempoolSettings, ProviderSettings};
pub use error::ConfigError;
pub use overrides::{apply_override, parse_override};

/// Reads `path`, applies env-var overrides then `cli_overrides` (later
/// entries win), and deserializes the result into [`Config`]. Mirrors
/// the override-then-deserialize order of a TOML-first config loader:
/// the file defines the shape, overrides only replace leaf values that
/// already exist.
pub fn load(path: &Path, cli_overrides: &[String]) -> Result<Config, ConfigError> {
    let raw = fs::read_to_string(path)?;
    let mut value: toml::Value = toml::from_str(&raw)?;

    let table = value
        .as_table_mut()
        .ok_or_else(|| ConfigError::TraverseNonTableAt { key: "<root>".to_string(), path: String::new() })?;

    let mut override_strs = env::gather_overrides();
    override_strs.extend_from_slice(cli_overrides);

    for override_str in &override_strs {
        let (path, value) = parse_override(override_str)?;
        apply_override(&path, value, table)?;
    }

    if let Some(urls) = env::rpc_url_list("PROVIDER_NETWORK_RPC_URLS") {
        set_table_value(table, "provider", "network_rpc_urls", urls)?;
    }
    if let Some(urls) = env::rpc_url_list("PROVIDER_MEMPOOL_RPC_URLS") {
        set_table_value(table, "provider", "mempool_rpc_urls", urls)?;
    }

    value.try_into::<Config>().map_err(ConfigError::from)
}

fn set_table_value(
    table: &mut toml::value::Table,
    section: &str,
    key: &str,
    urls: Vec<String>,
) -> Result<(), ConfigError> {
    match table.get_mut(section) {
        Some(toml::Value::Table(section_table)) => {
            section_table.insert(key.to_string(), toml::Value::Array(urls.into_iter().map(toml::Value::String).collect()));
            Ok(())
        }
        Some(_) => Err(ConfigError::TraverseNonTableAt { key: section.to_string(), path: format!("{section}.{key}") }),
        None => Err(ConfigError::MissingKey { key: section.to_string(), path: format!("{section}.{key}") }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const SAMPLE_TOML: &str = r#"
data_dir = "./data"
start_block_height = 0
max_block_height = 900000

[network]
network = "regtest"
native_currency_symbol = "BTC"
native_currency_decimals = 8
has_segwit = true
has_taproot = true
has_rbf = true
has_csv = true
has_cltv = true
max_block_size = 4000000
max_block_weight = 4000000
difficulty_adjustment_interval = 2016
target_block_time_secs = 600

[blocks_queue]
loader_strategy_name = "sequential"
loader_preloader_base_count = 2

[mempool]
min_fee_rate = 1.0

[event_store]
snapshot_interval = 1000

[provider]
rpc_user = "user"
rpc_password = "pass"
retry_count = 3
retry_interval = 1000
rate_limit_max_concurrent_requests = 16
rate_limit_max_batch_size = 100
rate_limit_request_delay_ms = 0
network_rpc_urls = ["http://127.0.0.1:18443"]
mempool_rpc_urls = []
"#;

    fn write_sample() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE_TOML.as_bytes()).unwrap();
        file
    }

    #[test]
    fn load_parses_the_file_with_no_overrides() {
        let file = write_sample();
        let config = load(file.path(), &[]).unwrap();
        assert_eq!(config.max_block_height, Some(900_000));
        assert_eq!(config.blocks_queue.loader_strategy_name, "sequential");
        assert_eq!(config.queue_iterator_blocks_batch_size(), 8_000_000);
    }

    #[test]
    fn cli_overrides_win_over_the_file() {
        let file = write_sample();
        let config = load(file.path(), &["blocks_queue.loader_strategy_name=pull-network".to_string()]).unwrap();
        assert_eq!(config.blocks_queue.loader_strategy_name, "pull-network");
    }

    #[test]
    fn an_override_for_a_missing_section_is_rejected() {
        let file = write_sample();
        let err = load(file.path(), &["nonexistent.field=1".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }
}

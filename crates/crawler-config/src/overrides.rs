use toml::value::Table;

use crate::error::ConfigError;

type Override = (String, toml::Value);

/// Parses one `-o key.path=value` string. The value side is sniffed as
/// `i64`, then `bool`, then falls back to a plain string.
pub fn parse_override(override_str: &str) -> Result<Override, ConfigError> {
    let (key, value_str) =
        override_str.split_once('=').ok_or_else(|| ConfigError::InvalidOverride(override_str.to_string()))?;
    Ok((key.to_string(), parse_value(value_str)))
}

fn parse_value(str_value: &str) -> toml::Value {
    str_value
        .parse::<i64>()
        .map(toml::Value::Integer)
        .or_else(|_| str_value.parse::<bool>().map(toml::Value::Boolean))
        .unwrap_or_else(|_| toml::Value::String(str_value.to_string()))
}

/// Applies a single dotted-path override onto the raw TOML table,
/// before it's deserialized into [`crate::Config`]. Every path segment
/// but the last must already exist as a table; the config file is the
/// source of truth for shape, overrides only replace leaf values.
pub fn apply_override(path: &str, value: toml::Value, table: &mut Table) -> Result<(), ConfigError> {
    apply_override_inner(path, path, value, table)
}

fn apply_override_inner(
    original_path: &str,
    remaining_path: &str,
    value: toml::Value,
    table: &mut Table,
) -> Result<(), ConfigError> {
    match remaining_path.split_once('.') {
        None => {
            table.insert(remaining_path.to_string(), value);
            Ok(())
        }
        Some((key, rest)) => match table.get_mut(key) {
            Some(toml::Value::Table(t)) => apply_override_inner(original_path, rest, value, t),
            Some(_) => {
                Err(ConfigError::TraverseNonTableAt { key: key.to_string(), path: original_path.to_string() })
            }
            None => Err(ConfigError::MissingKey { key: key.to_string(), path: original_path.to_string() }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_value_prefers_int_then_bool_then_string() {
        assert_eq!(parse_value("42"), toml::Value::Integer(42));
        assert_eq!(parse_value("true"), toml::Value::Boolean(true));
        assert_eq!(parse_value("sequential"), toml::Value::String("sequential".to_string()));
    }

    #[test]
    fn apply_override_replaces_a_nested_leaf() {
        let mut table: Table = toml::from_str("[network]\nmax_block_weight = 4000000\n").unwrap();

        let (path, value) = parse_override("network.max_block_weight=1000").unwrap();
        apply_override(&path, value, &mut table).unwrap();

        assert_eq!(table["network"]["max_block_weight"].as_integer(), Some(1000));
    }

    #[test]
    fn apply_override_rejects_an_unknown_section() {
        let mut table: Table = toml::from_str("[network]\nmax_block_weight = 4000000\n").unwrap();

        let (path, value) = parse_override("mempool.min_fee_rate=2.0").unwrap();
        let err = apply_override(&path, value, &mut table).unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }
}

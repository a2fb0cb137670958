use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("malformed toml: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("missing key '{key}' at '{path}'")]
    MissingKey { key: String, path: String },

    #[error("can't traverse into non-table key '{key}' at '{path}'")]
    TraverseNonTableAt { key: String, path: String },

    #[error("invalid override '{0}', expected key=value")]
    InvalidOverride(String),
}

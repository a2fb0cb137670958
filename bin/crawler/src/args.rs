use std::path::PathBuf;

use clap::Parser;

/// Bitcoin blockchain crawler.
#[derive(Debug, Clone, Parser)]
#[command(name = "crawler", about = "Bitcoin blockchain crawler")]
pub struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    pub config: PathBuf,

    /// Overrides the config's `data_dir`.
    #[arg(short, long)]
    pub datadir: Option<PathBuf>,

    /// Generic `key.path=value` config overrides, e.g.
    /// `-o mempool.min_fee_rate=2.0`. Applied after env-var overrides.
    #[arg(short = 'o', long = "override")]
    pub overrides: Vec<String>,
}

impl Args {
    /// Folds CLI-attribute overrides (`--datadir`) in with the generic
    /// `-o` overrides, so both feed [`crawler_config::load`] uniformly.
    pub fn all_overrides(&self) -> Vec<String> {
        let mut overrides = self.overrides.clone();
        if let Some(datadir) = &self.datadir {
            overrides.push(format!("data_dir={}", datadir.display()));
        }
        overrides
    }
}

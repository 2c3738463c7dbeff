//! tabmate operator tool.
//!
//! Inspects and maintains the durable store: storage info, export/import,
//! clearing, and listing which tasks apply to a domain. Logging goes to
//! stderr so command output on stdout stays pipeable.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tabmate_cache::CacheConfig;
use tabmate_core::{AppConfig, Store};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "tabmate")]
#[command(about = "Inspect and maintain the tabmate data store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show storage footprint, record counts and effective cache settings.
    Info,
    /// Write every task, pattern, preference and usage stat as JSON.
    Export {
        /// Destination file; stdout when omitted.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Load a previously exported JSON document.
    Import {
        file: PathBuf,
        /// Replace existing data instead of merging into it.
        #[arg(long)]
        overwrite: bool,
    },
    /// Remove all stored data and restore defaults.
    Clear {
        #[arg(long)]
        yes: bool,
    },
    /// List stored tasks.
    Tasks,
    /// List enabled tasks whose patterns match a domain.
    Match { domain: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let config = AppConfig::load().context("failed to load configuration")?;
    let cache_config =
        CacheConfig::from_value(config.runtime_cache.clone()).context("invalid runtime cache configuration")?;

    tracing::info!(db_path = %config.db_path.display(), "Opening tabmate store");
    let store = Store::open(&config).await.context("failed to open store")?;

    let mut stdout = std::io::stdout().lock();
    commands::run(cli.command, &store, &cache_config, &mut stdout).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from(["tabmate", "import", "backup.json", "--overwrite"]).unwrap();
        match cli.command {
            Command::Import { file, overwrite } => {
                assert_eq!(file, PathBuf::from("backup.json"));
                assert!(overwrite);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_export_short_flag() {
        let cli = Cli::try_parse_from(["tabmate", "export", "-o", "out.json"]).unwrap();
        assert!(matches!(cli.command, Command::Export { output: Some(path) } if path == PathBuf::from("out.json")));
    }

    #[test]
    fn test_match_requires_domain() {
        assert!(Cli::try_parse_from(["tabmate", "match"]).is_err());
    }
}

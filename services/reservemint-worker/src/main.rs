//! reservemint Worker
//!
//! Verifies reserves and mints stored requests, at most once per
//! (wallet, reserve proof).
//!
//! # Usage
//!
//! ```bash
//! # Store a request after checking reserves
//! reservemint-worker submit --wallet 0xabc... --amount 100
//!
//! # Mint stored requests
//! reservemint-worker mint req_5f0c... req_9a1d...
//!
//! # List stored requests with their proofs
//! reservemint-worker requests --limit 10
//!
//! # Rehearse against seeded balances, an in-memory chain and an in-memory store
//! reservemint-worker --dry-run verify --wallet 0xabc... --amount 100
//!
//! # Environment overrides
//! RESERVEMINT__RELAYER__URL=http://relayer:8545 reservemint-worker mint req_5f0c...
//! ```
//!
//! Exit status is 0 on success (including already-minted requests), 1 on
//! any failure, 2 when a key is held by an unfinished mint and 3 when a mint
//! needs manual reconciliation.

mod app;
mod commands;
mod config;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::app::App;
use crate::config::WorkerConfig;

// =============================================================================
// CLI Arguments
// =============================================================================

/// reservemint worker - reserve-backed minting
#[derive(Parser, Debug)]
#[command(name = "reservemint-worker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "RESERVEMINT_CONFIG", global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RESERVEMINT_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "RESERVEMINT_LOG_FORMAT", global = true)]
    log_format: Option<String>,

    /// Use seeded balances and an in-memory chain
    #[arg(long, env = "RESERVEMINT_DRY_RUN", global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Mint stored requests concurrently
    Mint {
        /// Request ids (with or without the req_ prefix)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Check reserves for a wallet without minting
    Verify {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        amount: String,
    },

    /// Verify reserves and store a new mint request
    Submit {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        amount: String,
    },

    /// List stored mint requests and their reserve proofs, newest first
    Requests {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// List recorded mint receipts, newest first
    Receipts {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut worker_config = WorkerConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        worker_config.logging.level = level;
    }
    if let Some(format) = args.log_format {
        worker_config.logging.format = format;
    }

    init_logging(&worker_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dry_run = args.dry_run,
        "Starting reservemint worker"
    );

    worker_config.validate(args.dry_run)?;
    let app = App::build(&worker_config, args.dry_run).await?;

    match args.command {
        Command::Mint { ids } => commands::run_mint(&app, ids).await,
        Command::Verify { wallet, amount } => commands::run_verify(&app, &wallet, &amount).await,
        Command::Submit { wallet, amount } => commands::run_submit(&app, &wallet, &amount).await,
        Command::Requests { limit } => commands::run_requests(&app, limit).await,
        Command::Receipts { limit } => commands::run_receipts(&app, limit).await,
    }
}

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => {
            subscriber
                .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
        _ => {
            subscriber
                .with(fmt::layer().pretty().with_target(true).with_writer(std::io::stderr))
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "reservemint-worker",
            "mint",
            "req_00000000-0000-0000-0000-000000000001",
            "--dry-run",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(args.dry_run);
        assert_eq!(args.log_format.as_deref(), Some("json"));
        assert!(matches!(args.command, Command::Mint { ids } if ids.len() == 1));
    }

    #[test]
    fn test_requests_limit_defaults() {
        let args = Args::try_parse_from(["reservemint-worker", "requests"]).unwrap();
        assert!(matches!(args.command, Command::Requests { limit: 20 }));
    }

    #[test]
    fn test_mint_requires_ids() {
        assert!(Args::try_parse_from(["reservemint-worker", "mint"]).is_err());
    }
}

//! Service wiring

use std::sync::Arc;

use anyhow::Context;
use reservemint_chain::{BlockchainClient, InMemoryChain, RelayerClient};
use reservemint_issuer::MintOrchestrator;
use reservemint_reserve::{BalanceSource, EtherscanBalanceSource, ReserveVerifier, StaticBalanceSource};
use reservemint_store::{MemoryStore, PersistenceStore, SqliteStore};
use reservemint_types::ReserveCurrency;

use crate::config::WorkerConfig;

/// Collaborators shared by every command
pub struct App {
    pub store: Arc<dyn PersistenceStore>,
    pub verifier: ReserveVerifier,
    pub orchestrator: MintOrchestrator,
    pub currency_priority: Vec<ReserveCurrency>,
    pub max_concurrency: usize,
}

impl App {
    /// Dry runs use an in-memory store and never open `database.url`
    pub async fn build(config: &WorkerConfig, dry_run: bool) -> anyhow::Result<Self> {
        if dry_run {
            tracing::warn!(url = %config.database.url, "Dry run: configured store left untouched");
            return Self::with_store(config, dry_run, Arc::new(MemoryStore::new()));
        }

        tracing::info!(url = %config.database.url, "Opening store");
        let store: Arc<dyn PersistenceStore> = Arc::new(
            SqliteStore::connect(&config.database.url, config.database.max_connections)
                .await
                .context("failed to open store")?,
        );
        Self::with_store(config, dry_run, store)
    }

    pub fn with_store(
        config: &WorkerConfig,
        dry_run: bool,
        store: Arc<dyn PersistenceStore>,
    ) -> anyhow::Result<Self> {
        let (source, chain) = if dry_run {
            tracing::warn!("Dry run: balances are seeded from config and mints stay in memory");
            let seeded = StaticBalanceSource::new();
            for (wallet, currency, raw) in config.seeded_balances()? {
                seeded.set_balance(&wallet, currency, &raw);
            }
            (
                Arc::new(seeded) as Arc<dyn BalanceSource>,
                Arc::new(InMemoryChain::new()) as Arc<dyn BlockchainClient>,
            )
        } else {
            let etherscan = config.etherscan_config()?;
            let relayer = config.relayer_config()?;
            tracing::info!(?etherscan, ?relayer, "Using live balance source and relayer");
            (
                Arc::new(EtherscanBalanceSource::new(etherscan)?) as Arc<dyn BalanceSource>,
                Arc::new(RelayerClient::new(relayer)?) as Arc<dyn BlockchainClient>,
            )
        };

        let verifier = ReserveVerifier::new(source, config.balance_timeout());
        let orchestrator = MintOrchestrator::new(
            store.clone(),
            verifier.clone(),
            chain,
            config.orchestrator_config()?,
        );

        Ok(Self {
            store,
            verifier,
            orchestrator,
            currency_priority: config.currency_priority()?,
            max_concurrency: config.mint.max_concurrency,
        })
    }
}

//! Worker Configuration
//!
//! Layered from `config/default`, `config/local`, an optional file given on
//! the command line and `RESERVEMINT__`-prefixed environment variables, e.g.
//! `RESERVEMINT__ETHERSCAN__API_KEY`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use reservemint_chain::RelayerConfig;
use reservemint_issuer::OrchestratorConfig;
use reservemint_reserve::EtherscanConfig;
use reservemint_types::{ReserveCurrency, WalletAddress};
use serde::{Deserialize, Serialize};

/// Worker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub etherscan: EtherscanSettings,

    #[serde(default)]
    pub relayer: RelayerSettings,

    #[serde(default)]
    pub mint: MintSettings,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Balances served instead of the explorer under `--dry-run`
    #[serde(default)]
    pub dry_run: DryRunSettings,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

/// Block explorer settings
#[derive(Clone, Serialize, Deserialize)]
pub struct EtherscanSettings {
    #[serde(default = "default_etherscan_url")]
    pub api_url: String,

    /// Set through `RESERVEMINT__ETHERSCAN__API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Token contract overrides by currency symbol
    #[serde(default)]
    pub contracts: HashMap<String, String>,
}

impl Default for EtherscanSettings {
    fn default() -> Self {
        Self {
            api_url: default_etherscan_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout(),
            contracts: HashMap::new(),
        }
    }
}

impl fmt::Debug for EtherscanSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtherscanSettings")
            .field("api_url", &self.api_url)
            .field("api_key", &mask(&self.api_key))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("contracts", &self.contracts)
            .finish()
    }
}

/// Mint relayer settings
#[derive(Clone, Serialize, Deserialize)]
pub struct RelayerSettings {
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token, set through `RESERVEMINT__RELAYER__API_KEY`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Decimals of the minted token
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u8,

    #[serde(default = "default_confirm_timeout")]
    pub confirm_timeout_secs: u64,
}

impl Default for RelayerSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            token_decimals: default_token_decimals(),
            confirm_timeout_secs: default_confirm_timeout(),
        }
    }
}

impl fmt::Debug for RelayerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerSettings")
            .field("url", &self.url)
            .field("api_key", &mask(&self.api_key))
            .field("token_decimals", &self.token_decimals)
            .field("confirm_timeout_secs", &self.confirm_timeout_secs)
            .finish()
    }
}

/// Mint pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintSettings {
    /// Reserve currencies to try, most preferred first
    #[serde(default = "default_currency_priority")]
    pub currency_priority: Vec<String>,

    /// Deadline for each balance lookup
    #[serde(default = "default_balance_timeout")]
    pub balance_timeout_ms: u64,

    /// Deadline for submission plus confirmation
    #[serde(default = "default_confirm_timeout")]
    pub submit_timeout_secs: u64,

    /// Mints run at the same time by one `mint` command
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

impl Default for MintSettings {
    fn default() -> Self {
        Self {
            currency_priority: default_currency_priority(),
            balance_timeout_ms: default_balance_timeout(),
            submit_timeout_secs: default_confirm_timeout(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// One seeded balance for dry runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeededBalance {
    pub wallet: String,
    pub currency: String,
    /// Smallest units, as the explorer would report
    pub raw: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DryRunSettings {
    #[serde(default)]
    pub balances: Vec<SeededBalance>,
}

fn mask(secret: &Option<String>) -> Option<&'static str> {
    secret.as_ref().map(|_| "***")
}

// =============================================================================
// Default Functions
// =============================================================================

fn default_database_url() -> String {
    "sqlite://reservemint.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_etherscan_url() -> String {
    reservemint_reserve::etherscan::DEFAULT_ETHERSCAN_URL.to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_token_decimals() -> u8 {
    reservemint_chain::relayer::DEFAULT_TOKEN_DECIMALS
}

fn default_confirm_timeout() -> u64 {
    120
}

fn default_currency_priority() -> Vec<String> {
    vec!["USDT".to_string(), "USDC".to_string(), "EURC".to_string()]
}

fn default_balance_timeout() -> u64 {
    10_000
}

fn default_max_concurrency() -> usize {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl WorkerConfig {
    /// Load configuration from files and environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RESERVEMINT")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()?
            .try_deserialize()
            .context("invalid worker configuration")
    }

    /// Check settings needed for live (non dry-run) operation
    pub fn validate(&self, dry_run: bool) -> anyhow::Result<()> {
        self.currency_priority()?;
        if self.mint.max_concurrency == 0 {
            anyhow::bail!("mint.max_concurrency must be at least 1");
        }
        if dry_run {
            self.seeded_balances()?;
            return Ok(());
        }
        if self.etherscan.api_key.as_deref().unwrap_or_default().is_empty() {
            anyhow::bail!(
                "Etherscan API key is not set. Set RESERVEMINT__ETHERSCAN__API_KEY or use --dry-run."
            );
        }
        if self.relayer.url.as_deref().unwrap_or_default().is_empty() {
            anyhow::bail!("Relayer URL is not set. Set RESERVEMINT__RELAYER__URL or use --dry-run.");
        }
        Ok(())
    }

    pub fn currency_priority(&self) -> anyhow::Result<Vec<ReserveCurrency>> {
        if self.mint.currency_priority.is_empty() {
            anyhow::bail!("mint.currency_priority must name at least one currency");
        }
        let mut priority = Vec::with_capacity(self.mint.currency_priority.len());
        for symbol in &self.mint.currency_priority {
            let currency = ReserveCurrency::from_str(symbol)?;
            if priority.contains(&currency) {
                anyhow::bail!("mint.currency_priority lists {currency} more than once");
            }
            priority.push(currency);
        }
        Ok(priority)
    }

    pub fn orchestrator_config(&self) -> anyhow::Result<OrchestratorConfig> {
        Ok(OrchestratorConfig {
            currency_priority: self.currency_priority()?,
            submit_timeout: Duration::from_secs(self.mint.submit_timeout_secs),
        })
    }

    pub fn balance_timeout(&self) -> Duration {
        Duration::from_millis(self.mint.balance_timeout_ms)
    }

    pub fn etherscan_config(&self) -> anyhow::Result<EtherscanConfig> {
        let mut config = EtherscanConfig::new(self.etherscan.api_key.clone().unwrap_or_default())
            .with_url(self.etherscan.api_url.clone());
        config.request_timeout = Duration::from_secs(self.etherscan.request_timeout_secs);
        for (symbol, contract) in &self.etherscan.contracts {
            config = config.with_contract(ReserveCurrency::from_str(symbol)?, contract.clone());
        }
        Ok(config)
    }

    pub fn relayer_config(&self) -> anyhow::Result<RelayerConfig> {
        let url = self
            .relayer
            .url
            .clone()
            .context("relayer.url is not set")?;
        let mut config = RelayerConfig::new(url);
        config.api_key = self.relayer.api_key.clone();
        config.token_decimals = self.relayer.token_decimals;
        config.confirm_timeout = Duration::from_secs(self.relayer.confirm_timeout_secs);
        Ok(config)
    }

    pub fn seeded_balances(&self) -> anyhow::Result<Vec<(WalletAddress, ReserveCurrency, String)>> {
        self.dry_run
            .balances
            .iter()
            .map(|b| -> anyhow::Result<_> {
                Ok((
                    WalletAddress::parse(&b.wallet)?,
                    ReserveCurrency::from_str(&b.currency)?,
                    b.raw.clone(),
                ))
            })
            .collect()
    }
}

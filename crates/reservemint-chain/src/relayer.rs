//! HTTP relayer client
//!
//! The relayer holds the minter key, broadcasts the transaction and waits
//! for confirmation before answering.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reservemint_types::{to_smallest_units, AnnotatedProof, TransactionRef, WalletAddress};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{BlockchainClient, ChainError, Result};

/// Decimals of the minted token when not configured
pub const DEFAULT_TOKEN_DECIMALS: u8 = 6;

#[derive(Clone)]
pub struct RelayerConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub token_decimals: u8,
    /// Upper bound on submit plus confirmation
    pub confirm_timeout: Duration,
}

impl RelayerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            api_key: None,
            token_decimals: DEFAULT_TOKEN_DECIMALS,
            confirm_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

impl fmt::Debug for RelayerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayerConfig")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("token_decimals", &self.token_decimals)
            .field("confirm_timeout", &self.confirm_timeout)
            .finish()
    }
}

#[derive(Serialize)]
struct MintCall<'a> {
    to: &'a str,
    /// Smallest units as a decimal string; u128 does not fit JSON numbers
    amount_units: String,
    proof: &'a AnnotatedProof,
}

#[derive(Debug, Deserialize)]
struct MintReply {
    tx_hash: Option<String>,
    status: String,
    #[serde(default)]
    error: Option<String>,
}

impl MintReply {
    fn into_result(self) -> Result<TransactionRef> {
        match (self.status.as_str(), self.tx_hash) {
            ("confirmed", Some(hash)) => Ok(TransactionRef::new(hash)),
            ("reverted", Some(hash)) => Err(ChainError::Reverted {
                tx: TransactionRef::new(hash),
            }),
            (status, _) => Err(ChainError::rejected(
                self.error
                    .unwrap_or_else(|| format!("relayer status {status}")),
            )),
        }
    }
}

/// Submits mints through an HTTP relayer
pub struct RelayerClient {
    config: RelayerConfig,
    client: reqwest::Client,
}

impl RelayerClient {
    pub fn new(config: RelayerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.confirm_timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &RelayerConfig {
        &self.config
    }
}

#[async_trait]
impl BlockchainClient for RelayerClient {
    async fn submit_mint(
        &self,
        wallet: &WalletAddress,
        amount: Decimal,
        proof: &AnnotatedProof,
    ) -> Result<TransactionRef> {
        let units = to_smallest_units(amount, self.config.token_decimals)
            .map_err(|e| ChainError::InvalidAmount(e.to_string()))?;

        let call = MintCall {
            to: wallet.as_str(),
            amount_units: units.to_string(),
            proof,
        };

        debug!(%wallet, %amount, units = %units, url = %self.config.url, "Submitting mint to relayer");

        let mut req = self
            .client
            .post(format!("{}/mint", self.config.url))
            .json(&call);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ChainError::Timeout {
                    after_ms: self.config.confirm_timeout.as_millis() as u64,
                }
            } else {
                ChainError::Transport(e.to_string())
            }
        })?;

        let status = resp.status();
        if status.is_server_error() {
            warn!(%wallet, %status, "Relayer server error");
            return Err(ChainError::Transport(format!("relayer returned HTTP {status}")));
        }

        let reply: MintReply = resp
            .json()
            .await
            .map_err(|e| ChainError::Transport(format!("invalid relayer response: {e}")))?;

        let tx = reply.into_result()?;
        info!(%wallet, %amount, tx = %tx, "Mint confirmed");
        Ok(tx)
    }
}

//! Etherscan-compatible ERC-20 balance source

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reservemint_types::{RawBalance, ReserveCurrency, WalletAddress};
use serde::Deserialize;
use tracing::debug;

use crate::{BalanceError, BalanceSource};

pub const DEFAULT_ETHERSCAN_URL: &str = "https://api.etherscan.io/api";

/// Connection settings for an Etherscan-style explorer API
#[derive(Clone)]
pub struct EtherscanConfig {
    pub api_url: String,
    pub api_key: String,
    /// HTTP-level timeout; the verifier applies its own deadline as well
    pub request_timeout: Duration,
    /// Contract overrides for non-mainnet deployments
    pub contracts: HashMap<ReserveCurrency, String>,
}

impl EtherscanConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_ETHERSCAN_URL.to_string(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(10),
            contracts: HashMap::new(),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_contract(mut self, currency: ReserveCurrency, contract: impl Into<String>) -> Self {
        self.contracts.insert(currency, contract.into());
        self
    }

    /// Token contract queried for `currency`
    pub fn contract_for(&self, currency: ReserveCurrency) -> &str {
        self.contracts
            .get(&currency)
            .map(String::as_str)
            .unwrap_or_else(|| currency.mainnet_contract())
    }
}

impl fmt::Debug for EtherscanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EtherscanConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"***")
            .field("request_timeout", &self.request_timeout)
            .field("contracts", &self.contracts)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenBalanceResponse {
    status: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    result: serde_json::Value,
}

impl TokenBalanceResponse {
    /// Only `status == "1"` with a string result is a usable balance
    fn into_balance(self) -> Result<RawBalance, BalanceError> {
        if self.status != "1" {
            let detail = self.result.as_str().unwrap_or_default();
            return Err(BalanceError::unavailable(format!(
                "explorer status {}: {} {}",
                self.status, self.message, detail
            )
            .trim_end()
            .to_string()));
        }
        match self.result {
            serde_json::Value::String(raw) => Ok(RawBalance(raw)),
            other => Err(BalanceError::unavailable(format!(
                "unexpected result {other}"
            ))),
        }
    }
}

/// Reads token balances from an Etherscan-compatible explorer
pub struct EtherscanBalanceSource {
    config: EtherscanConfig,
    client: reqwest::Client,
}

impl EtherscanBalanceSource {
    pub fn new(config: EtherscanConfig) -> Result<Self, BalanceError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| BalanceError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &EtherscanConfig {
        &self.config
    }
}

#[async_trait]
impl BalanceSource for EtherscanBalanceSource {
    async fn get_balance(
        &self,
        address: &WalletAddress,
        currency: ReserveCurrency,
    ) -> Result<RawBalance, BalanceError> {
        let contract = self.config.contract_for(currency);
        debug!(%address, %currency, contract, url = %self.config.api_url, "Querying token balance");

        let resp = self
            .client
            .get(&self.config.api_url)
            .query(&[
                ("module", "account"),
                ("action", "tokenbalance"),
                ("contractaddress", contract),
                ("address", address.as_str()),
                ("tag", "latest"),
                ("apikey", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BalanceError::Transport(e.without_url().to_string()))?;

        if !resp.status().is_success() {
            return Err(BalanceError::unavailable(format!(
                "explorer returned HTTP {}",
                resp.status()
            )));
        }

        let body: TokenBalanceResponse = resp
            .json()
            .await
            .map_err(|e| BalanceError::unavailable(format!("invalid explorer response: {}", e.without_url())))?;

        body.into_balance()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Result<RawBalance, BalanceError> {
        serde_json::from_str::<TokenBalanceResponse>(json)
            .unwrap()
            .into_balance()
    }

    #[test]
    fn test_ok_response_yields_raw_balance() {
        let balance = parse(r#"{"status":"1","message":"OK","result":"120500000"}"#).unwrap();
        assert_eq!(balance, RawBalance::new("120500000"));
    }

    #[test]
    fn test_error_status_is_unavailable() {
        let err = parse(r#"{"status":"0","message":"NOTOK","result":"Max rate limit reached"}"#)
            .unwrap_err();
        match err {
            BalanceError::Unavailable { reason } => {
                assert!(reason.contains("NOTOK"));
                assert!(reason.contains("rate limit"));
            }
            other => panic!("expected Unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_non_string_result_is_unavailable() {
        assert!(parse(r#"{"status":"1","message":"OK","result":null}"#).is_err());
        assert!(parse(r#"{"status":"1","message":"OK","result":12}"#).is_err());
    }

    #[test]
    fn test_contract_overrides() {
        let config = EtherscanConfig::new("key")
            .with_contract(ReserveCurrency::Usdc, "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238");
        assert_eq!(
            config.contract_for(ReserveCurrency::Usdc),
            "0x1c7d4b196cb0c7b01d743fbc6116a902379c7238"
        );
        assert_eq!(
            config.contract_for(ReserveCurrency::Usdt),
            ReserveCurrency::Usdt.mainnet_contract()
        );
    }

    #[test]
    fn test_debug_masks_api_key() {
        let config = EtherscanConfig::new("super-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("***"));
    }
}

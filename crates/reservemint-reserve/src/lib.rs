//! reservemint Reserve - Verifying that held balances back a mint
//!
//! A [`ReserveVerifier`] walks an ordered list of candidate currencies,
//! asks a [`BalanceSource`] for each raw balance, normalizes it with the
//! currency's precision and stops at the first currency that covers the
//! requested amount.
//!
//! # Balance sources
//!
//! - [`EtherscanBalanceSource`]: ERC-20 `tokenbalance` lookups over HTTP
//! - [`StaticBalanceSource`]: in-memory balances for tests and dry runs

pub mod etherscan;
pub mod memory;
pub mod verifier;

use async_trait::async_trait;
use reservemint_types::{RawBalance, ReserveCurrency, WalletAddress};
use thiserror::Error;

pub use etherscan::{EtherscanBalanceSource, EtherscanConfig};
pub use memory::StaticBalanceSource;
pub use verifier::{ReserveError, ReserveVerifier, UnavailableCurrency};

/// Failure to obtain a balance from a source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BalanceError {
    #[error("Balance unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

impl BalanceError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Supplies raw token balances for an address
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Raw balance of `currency` held by `address`, in smallest units
    async fn get_balance(
        &self,
        address: &WalletAddress,
        currency: ReserveCurrency,
    ) -> Result<RawBalance, BalanceError>;
}

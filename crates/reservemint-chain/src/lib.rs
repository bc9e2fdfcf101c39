//! reservemint Chain - Submitting mint transactions
//!
//! A [`BlockchainClient`] submits a mint of a semantic amount to a wallet,
//! carrying the annotated reserve proof, and returns once the transaction
//! is confirmed.
//!
//! - [`RelayerClient`]: HTTP relayer that signs and broadcasts
//! - [`InMemoryChain`]: deterministic chain for tests and dry runs

pub mod memory;
pub mod relayer;

use async_trait::async_trait;
use reservemint_types::{AnnotatedProof, TransactionRef, WalletAddress};
use rust_decimal::Decimal;
use thiserror::Error;

pub use memory::{InMemoryChain, SubmittedMint};
pub use relayer::{RelayerClient, RelayerConfig};

/// Errors from mint submission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("Mint rejected: {reason}")]
    Rejected { reason: String },

    #[error("Mint transaction {tx} reverted")]
    Reverted { tx: TransactionRef },

    #[error("Mint not confirmed within {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid mint amount: {0}")]
    InvalidAmount(String),
}

impl ChainError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;

/// Submits mint transactions
#[async_trait]
pub trait BlockchainClient: Send + Sync {
    /// Mint `amount` to `wallet`, returning once the transaction is confirmed
    async fn submit_mint(
        &self,
        wallet: &WalletAddress,
        amount: Decimal,
        proof: &AnnotatedProof,
    ) -> Result<TransactionRef>;
}

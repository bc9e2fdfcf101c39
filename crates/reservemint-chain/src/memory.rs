//! In-memory chain with deterministic transaction hashes

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reservemint_types::{AnnotatedProof, TransactionRef, WalletAddress};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::{BlockchainClient, ChainError, Result};

/// A mint accepted by [`InMemoryChain`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedMint {
    pub wallet: WalletAddress,
    pub amount: Decimal,
    pub proof: AnnotatedProof,
    pub tx: TransactionRef,
}

#[derive(Default)]
struct ChainState {
    submitted: Vec<SubmittedMint>,
    attempts: usize,
    scripted: VecDeque<ChainError>,
}

/// Records every mint and confirms it immediately
///
/// Scripted failures are returned, in order, before any further mint is
/// accepted.
#[derive(Default)]
pub struct InMemoryChain {
    state: Mutex<ChainState>,
    latency: Option<Duration>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every submission, e.g. to widen race windows in tests
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Queue an error for the next submission
    pub fn fail_next(&self, error: ChainError) {
        self.state.lock().scripted.push_back(error);
    }

    /// Confirmed mints, in submission order
    pub fn submitted(&self) -> Vec<SubmittedMint> {
        self.state.lock().submitted.clone()
    }

    /// Submissions seen, including failed ones
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    /// Total confirmed amount minted to `wallet`
    pub fn minted_to(&self, wallet: &WalletAddress) -> Decimal {
        self.state
            .lock()
            .submitted
            .iter()
            .filter(|m| &m.wallet == wallet)
            .map(|m| m.amount)
            .sum()
    }
}

fn tx_hash(wallet: &WalletAddress, amount: Decimal, nonce: usize) -> TransactionRef {
    let mut hasher = Sha256::new();
    hasher.update(wallet.as_str().as_bytes());
    hasher.update(amount.normalize().to_string().as_bytes());
    hasher.update(nonce.to_be_bytes());
    TransactionRef::new(format!("0x{}", hex::encode(hasher.finalize())))
}

#[async_trait]
impl BlockchainClient for InMemoryChain {
    async fn submit_mint(
        &self,
        wallet: &WalletAddress,
        amount: Decimal,
        proof: &AnnotatedProof,
    ) -> Result<TransactionRef> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        state.attempts += 1;

        if let Some(error) = state.scripted.pop_front() {
            debug!(%wallet, %amount, %error, "Scripted mint failure");
            return Err(error);
        }
        if amount <= Decimal::ZERO {
            return Err(ChainError::InvalidAmount(amount.to_string()));
        }

        let tx = tx_hash(wallet, amount, state.submitted.len());
        state.submitted.push(SubmittedMint {
            wallet: wallet.clone(),
            amount,
            proof: proof.clone(),
            tx: tx.clone(),
        });
        debug!(%wallet, %amount, %tx, "Mint confirmed in memory");
        Ok(tx)
    }
}

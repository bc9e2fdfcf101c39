//! reservemint Store - Durable records for the mint pipeline
//!
//! Holds mint requests and one record per (wallet, idempotency key). A
//! record starts as a pending claim and becomes a permanent receipt once the
//! mint is confirmed. The claim is the only mutual-exclusion point between
//! concurrent mints of the same key.
//!
//! # Backends
//!
//! - [`MemoryStore`]: `DashMap` entry API, for tests and dry runs
//! - [`SqliteStore`]: `sqlx` SQLite pool with conditional inserts

pub mod error;
pub mod memory;
pub mod models;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reservemint_types::{IdempotencyKey, MintReceipt, MintRequest, RequestId, WalletAddress};
use uuid::Uuid;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Proof of holding the pending record for (wallet, key)
///
/// The token distinguishes this holder from any later claimant of the same
/// key, so only the winner can finalize or release it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    pub wallet: WalletAddress,
    pub idempotency_key: IdempotencyKey,
    pub token: Uuid,
    pub claimed_at: DateTime<Utc>,
}

impl Claim {
    pub fn new(wallet: WalletAddress, idempotency_key: IdempotencyKey) -> Self {
        Self {
            wallet,
            idempotency_key,
            token: Uuid::new_v4(),
            claimed_at: Utc::now(),
        }
    }

    fn lost(&self) -> StoreError {
        StoreError::ClaimLost {
            wallet: self.wallet.to_string(),
            idempotency_key: self.idempotency_key.to_string(),
        }
    }

    fn check_receipt(&self, receipt: &MintReceipt) -> StoreResult<()> {
        if receipt.wallet != self.wallet || receipt.idempotency_key != self.idempotency_key {
            return Err(StoreError::InvalidInput(format!(
                "receipt for {} / {} does not match claim for {} / {}",
                receipt.wallet, receipt.idempotency_key, self.wallet, self.idempotency_key
            )));
        }
        Ok(())
    }
}

/// Storage for requests, claims and receipts
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Load a mint request
    async fn get_request(&self, id: RequestId) -> StoreResult<MintRequest>;

    /// Record a new mint request; ids are unique
    async fn insert_request(&self, request: &MintRequest) -> StoreResult<()>;

    /// Most recently submitted requests first, with their captured proofs
    async fn list_requests(&self, limit: usize) -> StoreResult<Vec<MintRequest>>;

    /// Atomically create a pending claim if no record exists for (wallet, key).
    ///
    /// Returns `None` when a claim or receipt is already present.
    async fn claim_if_absent(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<Claim>>;

    /// Turn a held claim into the permanent receipt
    async fn write_receipt(&self, claim: &Claim, receipt: &MintReceipt) -> StoreResult<()>;

    /// Delete a pending claim. Returns whether it was still held.
    async fn release_claim(&self, claim: &Claim) -> StoreResult<bool>;

    /// Receipt for (wallet, key), if the mint completed
    async fn find_receipt(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<MintReceipt>>;

    /// When the pending claim on (wallet, key) was taken.
    ///
    /// `None` if the key is unclaimed or already minted.
    async fn claimed_since(
        &self,
        wallet: &WalletAddress,
        key: &IdempotencyKey,
    ) -> StoreResult<Option<DateTime<Utc>>>;

    /// Most recent receipts first
    async fn list_receipts(&self, limit: usize) -> StoreResult<Vec<MintReceipt>>;
}
